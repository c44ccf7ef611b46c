use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use azrm_core::resource_id::{self, ParsedResourceId};
use azrm_state::{LocalBackend, StateBackend, StateFile};

#[derive(Parser)]
#[command(name = "azrm")]
#[command(about = "Inspect Azure resource IDs and azrm state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resource ID commands
    Id {
        #[command(subcommand)]
        command: IdCommands,
    },
    /// State file commands
    State {
        /// Path to the state file
        #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
        state: PathBuf,

        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum IdCommands {
    /// Parse a resource ID, optionally as a specific kind
    Parse {
        id: String,

        /// Kind to parse as (see `azrm id kinds`)
        #[arg(long)]
        kind: Option<String>,
    },
    /// List the supported ID kinds and their templates
    Kinds,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List managed resources
    List,
    /// Show a managed resource
    Show { id: String },
    /// Forget a managed resource without deleting it
    Rm { id: String },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Id { command } => run_id_command(command),
        Commands::State { state, command } => run_state_command(&state, command).await,
    };

    match result {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run_id_command(command: IdCommands) -> Result<String, String> {
    match command {
        IdCommands::Parse { id, kind: None } => parse_generic(&id),
        IdCommands::Parse { id, kind: Some(kind) } => parse_as(&id, &kind),
        IdCommands::Kinds => Ok(list_kinds()),
    }
}

fn parse_generic(input: &str) -> Result<String, String> {
    let parsed = ParsedResourceId::parse(input).map_err(|e| e.to_string())?;
    parsed
        .validate_no_empty_segments()
        .map_err(|e| e.to_string())?;

    let mut out = String::new();
    out.push_str(&format!("{}: {}\n", "subscription".bold(), parsed.subscription_id));
    out.push_str(&format!("{}: {}\n", "resource group".bold(), parsed.resource_group));
    for segment in parsed.segments() {
        out.push_str(&format!("  {} = {}\n", segment.key.cyan(), segment.value));
    }
    Ok(out)
}

fn parse_as(input: &str, kind: &str) -> Result<String, String> {
    let id_kind = resource_id::kind(kind)
        .ok_or_else(|| format!("unknown ID kind {:?} (see `azrm id kinds`)", kind))?;
    let described = id_kind.parse(input).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}\n{}\n",
        described.description.green(),
        described.canonical
    ))
}

fn list_kinds() -> String {
    resource_id::kinds()
        .iter()
        .map(|k| {
            format!(
                "{} ({})\n    {}\n",
                k.name.bold(),
                k.kind,
                resource_id::template(k.segments)
            )
        })
        .collect()
}

async fn run_state_command(path: &Path, command: StateCommands) -> Result<String, String> {
    debug!("using state file {}", path.display());
    let backend = LocalBackend::with_path(path);
    match command {
        StateCommands::List => {
            let state = read_state(&backend).await?;
            Ok(list_state(&state))
        }
        StateCommands::Show { id } => {
            let state = read_state(&backend).await?;
            show_resource(&state, &id)
        }
        StateCommands::Rm { id } => {
            let mut state = read_state(&backend).await?;
            let removed = state
                .remove_by_id(&id)
                .ok_or_else(|| format!("no resource with ID {:?} in {}", id, path.display()))?;
            state.increment_serial();
            backend
                .write_state(&state)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "Removed {}.{} from state (serial {})\n",
                removed.resource_type, removed.name, state.serial
            ))
        }
    }
}

async fn read_state(backend: &LocalBackend) -> Result<StateFile, String> {
    backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no state file at {}", backend.state_path().display()))
}

fn list_state(state: &StateFile) -> String {
    if state.resources.is_empty() {
        return "No resources in state.\n".to_string();
    }
    let mut resources: Vec<_> = state.resources.iter().collect();
    resources.sort_by(|a, b| (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name)));
    resources
        .iter()
        .map(|r| format!("{}.{}  {}\n", r.resource_type, r.name.bold(), r.id))
        .collect()
}

fn show_resource(state: &StateFile, id: &str) -> Result<String, String> {
    let resource = state
        .find_by_id(id)
        .ok_or_else(|| format!("no resource with ID {:?} in state", id))?;
    let attributes = serde_json::to_string_pretty(&resource.attributes).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}.{}\n{}: {}\n{}\n",
        resource.resource_type,
        resource.name.bold(),
        "id".bold(),
        resource.id,
        attributes
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrm_state::ResourceState;
    use serde_json::json;
    use tempfile::tempdir;

    const CREATOR: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/rg1/providers/Microsoft.Maps/accounts/acc1/creators/c1";

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_parse_generic() {
        plain();
        let out = parse_generic(CREATOR).unwrap();
        assert!(out.contains("resource group: rg1"));
        assert!(out.contains("accounts = acc1"));
        assert!(out.contains("creators = c1"));
    }

    #[test]
    fn test_parse_generic_rejects_missing_resource_group() {
        let err = parse_generic("/subscriptions/s1/providers/Microsoft.Maps/accounts/a").unwrap_err();
        assert!(err.contains("resourceGroups"));
    }

    #[test]
    fn test_parse_as_kind() {
        plain();
        let out = parse_as(CREATOR, "maps_account_creator").unwrap();
        assert!(out.ends_with(&format!("{}\n", CREATOR)));

        assert!(parse_as(CREATOR, "storage_account").is_err());
        let err = parse_as(CREATOR, "nope").unwrap_err();
        assert!(err.contains("unknown ID kind"));
    }

    #[test]
    fn test_list_kinds() {
        plain();
        let out = list_kinds();
        assert!(out.contains("maps_account_creator"));
        assert!(out.contains("/providers/Microsoft.Maps/accounts/"));
    }

    async fn write_state(path: &Path) -> StateFile {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("azurerm_maps_creator", "main", CREATOR)
                .with_attribute("storage_units", json!(2)),
        );
        state.increment_serial();
        LocalBackend::with_path(path).write_state(&state).await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_state_list_and_show() {
        plain();
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        write_state(&path).await;

        let out = run_state_command(&path, StateCommands::List).await.unwrap();
        assert!(out.contains("azurerm_maps_creator.main"));

        let out = run_state_command(&path, StateCommands::Show { id: CREATOR.to_string() })
            .await
            .unwrap();
        assert!(out.contains("\"storage_units\": 2"));

        let err = run_state_command(&path, StateCommands::Show { id: "/nope".to_string() })
            .await
            .unwrap_err();
        assert!(err.contains("no resource"));
    }

    #[tokio::test]
    async fn test_state_rm_increments_serial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let before = write_state(&path).await;

        run_state_command(&path, StateCommands::Rm { id: CREATOR.to_string() })
            .await
            .unwrap();

        let after = LocalBackend::with_path(&path).read_state().await.unwrap().unwrap();
        assert_eq!(after.serial, before.serial + 1);
        assert_eq!(after.lineage, before.lineage);
        assert!(after.resources.is_empty());
    }

    #[tokio::test]
    async fn test_state_commands_need_a_state_file() {
        let dir = tempdir().unwrap();
        let err = run_state_command(&dir.path().join("missing.json"), StateCommands::List)
            .await
            .unwrap_err();
        assert!(err.contains("no state file"));
    }
}
