use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let project = matches
        .get_one("project")
        .map(|s: &String| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --project"))?;

    let store_url = matches
        .get_one("store-url")
        .map(|s: &String| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --store-url"))?;

    let mut globals = GlobalArgs::new(project, store_url);

    if let Some(token) = matches.get_one::<String>("store-token") {
        globals.set_store_token(SecretString::from(token.to_string()));
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        globals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_the_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "ingreso",
            "--port",
            "9090",
            "--project",
            "atacama",
            "--store-url",
            "http://localhost:8087",
            "--store-token",
            "token",
        ]);

        let Ok(Action::Server { port, globals }) = handler(&matches) else {
            panic!("expected server action");
        };

        assert_eq!(port, 9090);
        assert_eq!(globals.project, "atacama");
        assert_eq!(globals.store_url, "http://localhost:8087");
        assert_eq!(globals.store_token.expose_secret(), "token");
    }

    #[test]
    fn handler_leaves_the_token_empty_when_absent() {
        let matches = commands::new().get_matches_from(vec!["ingreso", "--project", "atacama"]);

        let Ok(Action::Server { port, globals }) = handler(&matches) else {
            panic!("expected server action");
        };

        assert_eq!(port, 8080);
        assert_eq!(globals.store_token.expose_secret(), "");
    }
}
