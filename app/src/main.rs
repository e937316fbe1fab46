use std::process::ExitCode;

use tandem_app::{App, AppConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Tandem v{}", tandem_app::VERSION);

    match App::new(AppConfig::parse()).run() {
        Ok(stats) => {
            log::info!("Presented {} frames ({} from cache)", stats.frames, stats.reuses);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
