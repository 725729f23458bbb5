//! Runner scripts and solver launch
//!
//! The model is run from a generated `RunSolver.sh` (`.bat` on Windows)
//! opened in a fresh terminal. When the output directory also holds a
//! `LaunchSTKOMonitor` script, the monitor is started next to the solver.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::WriterConfig;
use crate::error::LaunchError;

pub const RUNNER_SCRIPT: &str = if cfg!(windows) { "RunSolver.bat" } else { "RunSolver.sh" };
pub const MONITOR_SCRIPT: &str = if cfg!(windows) {
    "LaunchSTKOMonitor.bat"
} else {
    "LaunchSTKOMonitor.sh"
};

pub struct SolverLauncher {
    config: WriterConfig,
    working_dir: PathBuf,
}

impl SolverLauncher {
    pub fn new(config: WriterConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// `PATH` for child processes, with the STKO python packages first.
    pub fn child_path(&self) -> Option<String> {
        let install = self.config.stko_install_dir.as_ref()?;
        let mut entries = vec![install.join("python_packages")];
        if cfg!(windows) {
            entries.push(install.clone());
        }
        if let Some(current) = std::env::var_os("PATH") {
            entries.extend(std::env::split_paths(&current));
        }
        std::env::join_paths(entries)
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    }

    fn solver_command(&self, script: &str, process_count: usize) -> String {
        if process_count <= 1 {
            format!("\"{}\" \"{}\"", self.config.opensees_path, script)
        } else {
            format!(
                "\"{}\" -np {} \"{}\" \"{}\"",
                self.config.mpi_launcher, process_count, self.config.opensees_mp_path, script
            )
        }
    }

    /// Shell script running `script` with one process or through MPI.
    pub fn runner_script(&self, script: &str, process_count: usize) -> String {
        let dir = self.working_dir.display();
        let path = self.child_path();
        let command = self.solver_command(script, process_count);
        if cfg!(windows) {
            let mut text = format!("@echo off\r\ncd /D \"{}\"\r\n", dir);
            if let Some(path) = path {
                text.push_str(&format!("set \"PATH={}\"\r\n", path));
            }
            text.push_str(&command);
            text.push_str("\r\npause\r\n");
            text
        } else {
            let mut text = format!("#!/bin/bash\ncd \"{}\"\n", dir);
            if let Some(path) = path {
                text.push_str(&format!("export PATH=\"{}\"\n", path));
            }
            text.push_str(&command);
            text.push('\n');
            text
        }
    }

    pub fn write_runner_script(&self, script: &str, process_count: usize) -> Result<PathBuf, LaunchError> {
        let path = self.working_dir.join(RUNNER_SCRIPT);
        fs::write(&path, self.runner_script(script, process_count))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }
        tracing::info!("Wrote runner script {:?}", path);
        Ok(path)
    }

    /// Write the runner script, open it in a terminal and start the monitor if present.
    pub fn launch(&self, script: &str, process_count: usize) -> Result<PathBuf, LaunchError> {
        let solver = if process_count <= 1 {
            &self.config.opensees_path
        } else {
            &self.config.opensees_mp_path
        };
        if Path::new(solver).is_absolute() && !Path::new(solver).exists() {
            return Err(LaunchError::SolverNotFound(solver.clone()));
        }

        let runner = self.write_runner_script(script, process_count)?;
        let (program, args) = match self.config.terminal.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => return Err(LaunchError::SolverNotFound("no terminal configured".into())),
        };

        tracing::info!("Running command: {} {} {:?}", program, args.join(" "), runner);
        let mut command = Command::new(&program);
        command.args(&args).arg(&runner).current_dir(&self.working_dir);
        if let Some(path) = self.child_path() {
            command.env("PATH", path);
        }
        command.spawn().map_err(|source| LaunchError::Spawn {
            command: program.clone(),
            source,
        })?;

        self.launch_monitor()?;
        Ok(runner)
    }

    /// Start the monitor script detached. A missing script is not an error.
    pub fn launch_monitor(&self) -> Result<bool, LaunchError> {
        let script = self.working_dir.join(MONITOR_SCRIPT);
        if !script.exists() {
            tracing::debug!("No monitor script in {:?}", self.working_dir);
            return Ok(false);
        }
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&script);
            c
        } else {
            let mut c = Command::new("bash");
            c.arg(&script);
            c
        };
        command
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = self.child_path() {
            command.env("PATH", path);
        }
        command.spawn().map_err(|source| LaunchError::Spawn {
            command: script.display().to_string(),
            source,
        })?;
        tracing::info!("Started monitor {:?}", script);
        Ok(true)
    }
}

/// Resolve a command the way the shell would: as given when it contains a
/// path separator, else through `PATH`.
pub fn find_command(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| {
            let plain = dir.join(command);
            let exe = dir.join(format!("{}.exe", command));
            [plain, exe]
        })
        .find(|p| p.is_file())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config() -> WriterConfig {
        let mut c = WriterConfig::default();
        c.opensees_path = "/opt/OpenSees".into();
        c.opensees_mp_path = "/opt/OpenSeesMP".into();
        c.mpi_launcher = "mpiexec".into();
        c
    }

    #[test]
    fn test_sequential_runner() {
        let launcher = SolverLauncher::new(config(), "/work/model");
        assert_eq!(
            launcher.runner_script("main.tcl", 1),
            "#!/bin/bash\ncd \"/work/model\"\n\"/opt/OpenSees\" \"main.tcl\"\n"
        );
    }

    #[test]
    fn test_mpi_runner_and_path() {
        let mut c = config();
        c.stko_install_dir = Some(PathBuf::from("/opt/stko"));
        let launcher = SolverLauncher::new(c, "/work/model");
        let script = launcher.runner_script("main.tcl", 4);
        assert!(script.contains("export PATH=\"/opt/stko/python_packages"));
        assert!(script.ends_with("\"mpiexec\" -np 4 \"/opt/OpenSeesMP\" \"main.tcl\"\n"));
        assert!(launcher.child_path().unwrap().starts_with("/opt/stko/python_packages"));
    }

    #[test]
    fn test_runner_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let launcher = SolverLauncher::new(config(), dir.path());
        let path = launcher.write_runner_script("main.tcl", 1).unwrap();
        assert_eq!(path.file_name().unwrap(), RUNNER_SCRIPT);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_missing_monitor_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = SolverLauncher::new(config(), dir.path());
        assert!(!launcher.launch_monitor().unwrap());
    }

    #[test]
    fn test_find_command() {
        let dir = tempfile::tempdir().unwrap();
        let solver = dir.path().join("OpenSees");
        fs::write(&solver, "").unwrap();
        assert_eq!(find_command(solver.to_str().unwrap()), Some(solver));
        assert_eq!(find_command(dir.path().join("missing").to_str().unwrap()), None);
        assert!(find_command("sh").is_some());
    }

    #[test]
    fn test_missing_absolute_solver() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = config();
        c.opensees_path = dir.path().join("nope").display().to_string();
        let launcher = SolverLauncher::new(c, dir.path());
        assert!(matches!(launcher.launch("main.tcl", 1), Err(LaunchError::SolverNotFound(_))));
    }
}
