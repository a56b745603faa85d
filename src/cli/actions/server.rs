use crate::cli::actions::Action;
use crate::ingreso;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, globals } => {
            ingreso::new(port, &globals).await?;
        }
    }

    Ok(())
}
