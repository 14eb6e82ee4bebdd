use osm_solids::*;
use std::process::ExitCode;

/**** Project patterns ****************************************************************************
 * Don't use apreviations, as Rust does
 * GroundPosition::new and all output positions take east before north (x, y)
 * stdout carries JSON only, everything else goes to the log (stderr)
 */

///////////////////////////////////////////////////////////////////////////////////////////////////
// MAIN ///////////////////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match main_async().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
