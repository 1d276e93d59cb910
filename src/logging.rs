use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Installs the global logger.
///
/// `RUST_LOG` still wins over the default level. With `log_file` set, lines
/// are appended to that file instead of stderr.
pub fn init(debug: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let default_level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialised: {}", e);
    }
    Ok(())
}
