//! Checklist ingestion for the encounter-rate pipeline.
//!
//! This crate turns the raw tab-separated database extracts into the
//! labelled, covariate-enriched checklist table the model is trained on.
//!
//! # Overview
//!
//! ## Filtering Workflow
//!
//! 1. **Read Extracts** ([`ebd`]): Stream the sampling event and observation
//!    extracts, keeping rows in the target region and protocols, and collapse
//!    shared checklists
//! 2. **Zero-fill** ([`filter::zero_fill`]): One labelled row per sampling
//!    event, detected iff the species was reported
//! 3. **Post-filter** ([`filter::post_filter`]): Drop rows with missing or
//!    excessive effort ([`filter::EffortLimits`])
//!
//! ## Enrichment Workflow
//!
//! 1. **Load Covariates** ([`covariates::CovariateTable`]): Habitat covariates
//!    keyed by location and year
//! 2. **Join** ([`covariates::join`]): Inner join; unmatched checklists are
//!    dropped and counted
//!
//! Stage outputs are [`table::ChecklistTable`] files; [`cache::StageCache`]
//! decides whether a stage output is still valid for its inputs and
//! parameters.
//!
//! # Examples
//!
//! ```
//! use encounter_data::filter::{EffortLimits, FilterSpec, filter_extracts};
//!
//! let sed = "SAMPLING EVENT IDENTIFIER\tOBSERVER ID\tSTATE CODE\tLATITUDE\tLONGITUDE\t\
//!            OBSERVATION DATE\tTIME OBSERVATIONS STARTED\tPROTOCOL TYPE\tDURATION MINUTES\t\
//!            EFFORT DISTANCE KM\tNUMBER OBSERVERS\tALL SPECIES REPORTED\n\
//!            S1\tobsr1\tUS-GA\t33.75\t-84.39\t2016-05-14\t06:45:00\tStationary\t30\t\t1\t1\n\
//!            S2\tobsr1\tUS-GA\t33.75\t-84.39\t2016-05-15\t06:45:00\tStationary\t30\t\t1\t1";
//! let ebd = "SAMPLING EVENT IDENTIFIER\tCOMMON NAME\tOBSERVATION COUNT\tOBSERVER ID\t\
//!            STATE CODE\tLATITUDE\tLONGITUDE\tOBSERVATION DATE\tTIME OBSERVATIONS STARTED\t\
//!            PROTOCOL TYPE\tDURATION MINUTES\tEFFORT DISTANCE KM\tNUMBER OBSERVERS\t\
//!            ALL SPECIES REPORTED\n\
//!            S2\tWood Thrush\t1\tobsr1\tUS-GA\t33.75\t-84.39\t2016-05-15\t06:45:00\t\
//!            Stationary\t30\t\t1\t1";
//!
//! let spec = FilterSpec::new("Wood Thrush", "US-GA");
//! let (checklists, _report) =
//!     filter_extracts(ebd.as_bytes(), sed.as_bytes(), &spec, &EffortLimits::default()).unwrap();
//! assert_eq!(checklists.len(), 2);
//! assert!(!checklists[0].species_observed);
//! assert!(checklists[1].species_observed);
//! ```

pub mod cache;
pub mod checklist;
pub mod covariates;
pub mod ebd;
pub mod filter;
pub mod table;
