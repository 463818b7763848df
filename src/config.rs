#![ allow (non_snake_case, non_upper_case_globals) ]

use std::{fs, time};
use std::ops::{Deref, Not};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use toml_edit::DocumentMut;

use tracing::{info, warn};
use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{Layer, Registry, reload};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::prelude::*;




# [ derive (Debug) ]
pub struct _Config {
    pub conf_file : Option <PathBuf>,
    pub toml      : RwLock <Option <DocumentMut>>,
    pub default   : DocumentMut,
    pub loglevel  : RwLock <Option <Handle <LevelFilter, Registry>>>,
    loaded_mtime  : RwLock <Option <time::SystemTime>>,
}


# [ derive (Debug, Clone) ]
pub struct Config ( Arc <_Config> );

impl Deref for Config {
    type Target = _Config;
    fn deref (&self) -> &_Config { &self.0 }
}




/// Returns the directory of the currently running executable
fn get_app_dir () -> Option<PathBuf> {
    std::env::current_exe().ok() .and_then (|p| p.parent() .map (|p| p.to_path_buf()))
}

/// Checks whether a path is writeable by the current user by attempting to open/create a file in write mode
fn is_writeable (path: &Path) -> bool {
    fs::OpenOptions::new().write(true).create(true).truncate(false).open(path).is_ok()
    // note that ^^ this is similar to 'touch' and will create an empty file if it doesnt exist
}




impl Config {

    pub const CONF_FILE_NAME : &'static str = "tabhop.conf.toml";
    pub const DATA_DIR_NAME  : &'static str = "Tabhop";

    pub const TABHOP_VERSION : &'static str = env!("CARGO_PKG_VERSION");

    /// the lowest background refresh period we'll honor, whatever the config says
    pub const MIN_REFRESH_INTERVAL_MS : u32 = 250;

    const DEFAULT_TOML : &'static str = include_str!("../tabhop.conf.toml");
    // ^^ our tabhop.conf.toml is at root of project, the include_str macro will load the contents at compile time


    pub fn instance () -> Config {
        static INSTANCE: OnceCell <Config> = OnceCell::new();
        INSTANCE .get_or_init ( || Config::new (Self::locate_config_file()) ) .clone()
    }

    /// Builds a config backed by the given file (or by the compiled-in defaults alone if there is none), and loads it
    pub fn new (conf_file: Option<PathBuf>) -> Config {
        let conf = Config ( Arc::new ( _Config {
            conf_file,
            toml     : RwLock::new (None),
            default  : DocumentMut::from_str (Self::DEFAULT_TOML) .unwrap_or_default(),
            loglevel : RwLock::new (None),
            loaded_mtime : RwLock::new (None),
        } ) );
        conf.load();
        conf
    }


    fn locate_config_file () -> Option<PathBuf> {
        let app_dir_loc = get_app_dir() .map (|p| p.join(Self::CONF_FILE_NAME));
        if app_dir_loc.as_ref() .is_some_and (|p| is_writeable(p)) {
            return app_dir_loc
        }
        let data_dir = dirs::data_local_dir() .map (|p| p.join(Self::DATA_DIR_NAME))?;
        if !data_dir.exists() {
            let _ = fs::create_dir_all (&data_dir);
        }
        let data_dir_loc = data_dir.join (Self::CONF_FILE_NAME);
        if is_writeable (&data_dir_loc) {
            return Some (data_dir_loc)
        }
        None
    }

    pub fn get_config_file (&self) -> Option<&Path> { self.conf_file.as_deref() }

    /// Directory holding the config file .. logs and settings.json live alongside
    pub fn get_data_dir (&self) -> Option<PathBuf> {
        self.conf_file.as_ref() .and_then (|p| p.parent()) .map (|p| p.to_path_buf())
    }


    pub fn reset (&self) {
        self.toml.write().unwrap() .replace (self.default.clone());
        self.write_back_toml();
        self.reload_log_level();
    }

    pub fn load (&self) {
        if let Some(conf_path) = self.conf_file.as_ref() {
            if let Ok(cfg_str) = fs::read_to_string(conf_path) {
                if !cfg_str.trim().is_empty() {
                    if let Ok(toml) = DocumentMut::from_str(&cfg_str) {
                        // successfully read and parsed a non-empty toml, we'll use that
                        self.toml.write().unwrap().replace(toml);
                        *self.loaded_mtime.write().unwrap() = self.file_mtime();
                        self.reload_log_level();
                        return
        }   }   }  }
        // there's no writeable location, or the file was empty, or we failed to read or parse it .. load default and write back
        self.reset();
    }

    fn write_back_toml (&self) {
        let Some(conf_path) = self.conf_file.as_ref() else { return };
        let toml_str = self.toml.read().unwrap().as_ref() .map (|d| d.to_string()) .unwrap_or_default();
        if let Err(e) = fs::write (conf_path, toml_str) {
            warn! ("failed to write config file {:?}: {}", conf_path, e);
        }
        *self.loaded_mtime.write().unwrap() = self.file_mtime();
    }

    fn file_mtime (&self) -> Option<time::SystemTime> {
        self.conf_file.as_ref() .and_then (|p| fs::metadata(p).ok()) .and_then (|m| m.modified().ok())
    }

    /// Re-reads the config file if it was modified since we last loaded or wrote it.
    /// Only the log level is applied live, everything else is picked up on the next start.
    pub fn reload_if_changed (&self) -> bool {
        let mtime = self.file_mtime();
        if mtime.is_none() || mtime == *self.loaded_mtime.read().unwrap() {
            return false
        }
        info! ("config file {:?} changed, reloading", self.conf_file);
        self.load();
        true
    }

    /// Pushes the configured level into the live log filter .. a no-op until the subscriber has been set up
    pub fn reload_log_level (&self) {
        let log_level = self.get_log_level();
        if let Some(h) = self.loglevel.read().unwrap().as_ref() {
            match h.modify (|f| *f = log_level) {
                Ok(_)  => warn! ("Setting log-level to {:?}", log_level.into_level()),
                Err(e) => warn! ("failed to set log-level to {:?}: {}", log_level.into_level(), e),
            }
        }
    }



    /// Sets up the daily rolling file logger next to the config file .. the returned guard must be held to keep flushing logs
    pub fn setup_log_subscriber (&self) -> Option<WorkerGuard> {

        if self.check_flag__logging_enabled().not() || self.loglevel.read().unwrap().is_some() {
            return None
        }
        let log_loc = self.get_data_dir()?;

        let log_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("tabhop_log")
            .filename_suffix("log")
            .max_log_files(7)
            .build(log_loc)
            .ok()?;

        let (nb_log_appender, guard) = non_blocking (log_appender);

        let (level_filter, filter_handle) = reload::Layer::new(self.get_log_level());

        *self.loglevel.write().unwrap() = Some(filter_handle);

        let timer = LocalTime::new ( ::time::format_description::parse (
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ).ok()? );

        let subscriber = tracing_subscriber::fmt::Layer::new()
            .with_writer(nb_log_appender)
            .with_timer(timer)
            .with_ansi(false)
            .with_filter(level_filter);

        if tracing_subscriber::registry().with(subscriber).try_init().is_err() {
            return None
        }
        info! ("Tabhop v{} logging to {:?}", Self::TABHOP_VERSION, self.get_data_dir());
        Some(guard)
    }



    fn check_flag (&self, flag_name:&str) -> bool {
        self.toml.read().unwrap().as_ref()
            .and_then (|t| t.get(flag_name))
            .and_then (|t| t.as_bool())
            .or_else (|| self.default.get(flag_name) .and_then (|t| t.as_bool()))
            .unwrap_or_default()
    }

    fn get_number (&self, key:&str) -> u32 {
        self.toml.read().unwrap().as_ref()
            .and_then (|t| t.get(key))
            .and_then (|t| t.as_integer())
            .or_else (|| self.default.get(key) .and_then (|t| t.as_integer()))
            .map (|n| n.clamp (0, u32::MAX as i64) as u32)
            .unwrap_or_default()
    }

    fn get_string (&self, key:&str) -> String {
        self.toml.read().unwrap().as_ref()
            .and_then (|t| t.get(key))
            .and_then (|t| t.as_str()) .map (|s| s.to_string())
            .or_else (|| self.default.get(key) .and_then (|t| t.as_str()) .map (|s| s.to_string()))
            .unwrap_or_default()
    }



    pub fn check_flag__logging_enabled (&self) -> bool { self.check_flag ("logging_enabled") }

    pub fn get_log_level (&self) -> LevelFilter {
        if !self.check_flag__logging_enabled() {
            return LevelFilter::OFF;
        }
        match self.get_string("logging_level").to_uppercase().as_str() {
            "TRACE" => LevelFilter::TRACE,
            "DEBUG" => LevelFilter::DEBUG,
            "WARN"  => LevelFilter::WARN,
            "ERROR" => LevelFilter::ERROR,
            "OFF"   => LevelFilter::OFF,
            _       => LevelFilter::INFO,
        }
    }

    pub fn get_target_process_name    (&self) -> String { self.get_string ("target_process_name") }
    pub fn get_next_window_hotkey     (&self) -> String { self.get_string ("next_window_hotkey") }
    pub fn get_previous_window_hotkey (&self) -> String { self.get_string ("previous_window_hotkey") }

    pub fn get_refresh_interval (&self) -> time::Duration {
        let ms = self.get_number("window_refresh_interval_ms") .max (Self::MIN_REFRESH_INTERVAL_MS);
        time::Duration::from_millis (ms as u64)
    }

}




#[cfg(test)]
mod tests {
    use super::*;

    fn temp_conf () -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::CONF_FILE_NAME);
        (dir, path)
    }

    #[test]
    fn missing_file_is_written_with_defaults() {
        let (_dir, path) = temp_conf();
        let conf = Config::new (Some(path.clone()));
        assert_eq!(conf.get_target_process_name(), "Dofus");
        assert_eq!(conf.get_next_window_hotkey(), "Alt + Tab");
        assert_eq!(conf.get_refresh_interval(), time::Duration::from_millis(2000));
        assert!(fs::read_to_string(&path).unwrap().contains("target_process_name"));
    }

    #[test]
    fn user_values_win_and_missing_keys_fall_back() {
        let (_dir, path) = temp_conf();
        fs::write (&path, "target_process_name = \"Wakfu\"\nwindow_refresh_interval_ms = 10\nlogging_level = 42\n").unwrap();
        let conf = Config::new (Some(path));
        assert_eq!(conf.get_target_process_name(), "Wakfu");
        assert_eq!(conf.get_previous_window_hotkey(), "Alt + Shift + Tab");
        // floor applies
        assert_eq!(conf.get_refresh_interval(), time::Duration::from_millis(250));
        // wrongly typed value falls back to the default
        assert_eq!(conf.get_log_level(), LevelFilter::INFO);
    }

    #[test]
    fn garbage_file_is_reset() {
        let (_dir, path) = temp_conf();
        fs::write (&path, "this is [ not toml").unwrap();
        let conf = Config::new (Some(path.clone()));
        assert_eq!(conf.get_target_process_name(), "Dofus");
        let written = fs::read_to_string(&path).unwrap();
        assert!(DocumentMut::from_str(&written).is_ok());
        assert!(written.contains("next_window_hotkey"));
    }

    #[test]
    fn logging_disabled_turns_level_off() {
        let (_dir, path) = temp_conf();
        fs::write (&path, "logging_enabled = false\nlogging_level = \"DEBUG\"\n").unwrap();
        let conf = Config::new (Some(path));
        assert_eq!(conf.get_log_level(), LevelFilter::OFF);
        assert!(conf.setup_log_subscriber().is_none());
    }

    #[test]
    fn edited_file_updates_the_live_log_level() {
        let (_dir, path) = temp_conf();
        let conf = Config::new (Some(path.clone()));
        let (_filter, handle) = reload::Layer::<LevelFilter, Registry>::new (conf.get_log_level());
        *conf.loglevel.write().unwrap() = Some (handle.clone());
        assert!(!conf.reload_if_changed());

        fs::write (&path, "logging_level = \"DEBUG\"\n").unwrap();
        // pin the mtime ahead so the edit is visible even on coarse-grained filesystems
        let later = time::SystemTime::now() + time::Duration::from_secs(10);
        fs::File::options().write(true).open(&path).unwrap().set_modified(later).unwrap();

        assert!(conf.reload_if_changed());
        assert_eq!(handle.clone_current(), Some(LevelFilter::DEBUG));
        assert!(!conf.reload_if_changed());

        conf.reset();
        assert_eq!(handle.clone_current(), Some(LevelFilter::INFO));
    }

    #[test]
    fn no_backing_file_still_serves_defaults() {
        let conf = Config::new (None);
        assert_eq!(conf.get_next_window_hotkey(), "Alt + Tab");
        assert!(conf.get_data_dir().is_none());
    }
}
