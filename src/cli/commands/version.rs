//! Version information display

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::config::schema::GameKind;

/// Print version information and the games this build can host.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let games: Vec<&str> = GameKind::ALL.iter().map(|k| k.id()).collect();

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version}");
            println!("games: {}", games.join(", "));
        }
        OutputFormat::Json => {
            let info = serde_json::json!({
                "name": name,
                "version": version,
                "games": games,
            });
            println!("{info}");
        }
    }
}
