use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use regdb::escape::{check_device_name, escape_string, replace_wildcard};
use regdb::ior::{self, Ior, NameResolver, NoResolver, SystemResolver};
use regdb::{HistoryFilter, PoolConfig, RegistryDb, SqliteBackend};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "regdb", version, about = "Registry database utilities")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the host:port an object reference points to
    Resolve {
        reference: String,
        /// Dump the decoded reference as JSON
        #[arg(long)]
        json: bool,
        /// Skip name lookups
        #[arg(long)]
        no_dns: bool,
    },
    /// Escape a string for a quoted SQL literal
    Escape { value: String },
    /// Translate a `*` wildcard into a LIKE pattern
    Wildcard { pattern: String },
    /// Validate and normalise a device name
    CheckName { name: String },
    /// Trim one property history in a SQLite registry
    Purge {
        #[arg(long)]
        database: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        name: String,
        #[arg(long, conflicts_with = "pipe")]
        attribute: Option<String>,
        #[arg(long)]
        pipe: Option<String>,
        #[arg(long, default_value_t = 10)]
        depth: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Resolve {
            reference,
            json,
            no_dns,
        } => {
            if json {
                let ior = Ior::parse(&reference).context("cannot decode reference")?;
                let profile = ior.iiop_profile().ok();
                let dump = serde_json::json!({ "ior": ior, "iiop": profile });
                println!("{}", serde_json::to_string_pretty(&dump)?);
            } else {
                let resolver: &dyn NameResolver = if no_dns { &NoResolver } else { &SystemResolver };
                let endpoint = ior::host_port_from_ior(&reference, resolver)
                    .context("cannot resolve reference")?;
                println!("{endpoint}");
            }
        }
        Command::Escape { value } => println!("{}", escape_string(&value)),
        Command::Wildcard { pattern } => println!("{}", replace_wildcard(&pattern)),
        Command::CheckName { name } => match check_device_name(&name) {
            Some(normalised) => println!("{normalised}"),
            None => bail!("'{name}' is not a valid device name"),
        },
        Command::Purge {
            database,
            table,
            field,
            key,
            name,
            attribute,
            pipe,
            depth,
        } => {
            let config = PoolConfig::new("regdb", "")
                .database(&database)
                .pool_size(1)
                .connect_retries(0)
                .history_depth(depth);
            let db = RegistryDb::connect(&config, &SqliteBackend::existing_only())?;

            let filter = match (&attribute, &pipe) {
                (Some(attribute), _) => HistoryFilter::Attribute(attribute),
                (None, Some(pipe)) => HistoryFilter::Pipe(pipe),
                (None, None) => HistoryFilter::Entity,
            };
            let deleted = db
                .retention()
                .purge(&table, &field, &key, &name, filter, None)?;
            println!("{deleted} row(s) deleted");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_attribute_and_pipe_conflict() {
        let args = [
            "regdb", "purge", "--database", "r.db", "--table", "t", "--field", "device", "--key",
            "k", "--name", "n", "--attribute", "a", "--pipe", "p",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_purge_depth_default() {
        let args = [
            "regdb", "purge", "--database", "r.db", "--table", "t", "--field", "device", "--key",
            "k", "--name", "n",
        ];
        match Cli::try_parse_from(args).unwrap().command {
            Command::Purge { depth, .. } => assert_eq!(depth, 10),
            _ => panic!("expected purge"),
        }
    }
}
