use std::{
    fs::{self, File},
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use encounter_data::{cache::StageCache, table::ChecklistTable};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<&Path>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<&Path>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_table<P>(path: P) -> anyhow::Result<ChecklistTable>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let table = ChecklistTable::open(path)
        .with_context(|| format!("Failed to read checklist table: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.len(), "read checklist table");
    Ok(table)
}

pub fn write_table<P>(table: &ChecklistTable, path: P) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    table
        .save(path)
        .with_context(|| format!("Failed to write checklist table: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.len(), "wrote checklist table");
    Ok(())
}

pub fn create_dir(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Runs `stage` unless its output is fresh for the same parameters and
/// inputs. `force` always reruns.
pub fn cached_stage<P, F>(
    name: &str,
    params: &P,
    inputs: &[&Path],
    output: &Path,
    force: bool,
    stage: F,
) -> anyhow::Result<()>
where
    P: serde::Serialize,
    F: FnOnce() -> anyhow::Result<()>,
{
    let cache = StageCache::new(name, params, inputs, output)
        .with_context(|| format!("Failed to compute cache key of stage {name}"))?;
    if !force && cache.is_fresh() {
        tracing::info!(stage = name, output = %output.display(), "output is up to date, skipping");
        return Ok(());
    }
    stage()?;
    cache
        .commit()
        .with_context(|| format!("Failed to record cache manifest of stage {name}"))?;
    Ok(())
}
