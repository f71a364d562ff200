//! 运维命令行

use std::io::{self, Write};

use clap::{Parser, Subcommand};

use crate::application::maintenance::Maintenance;
use crate::domain::rbac::USER_ROLE;

#[derive(Debug, Parser)]
#[command(name = "autogestor-cli", version, about = "AutoGestor maintenance commands")]
pub struct Cli {
    /// 配置目录
    #[arg(long, env = "APP_CONFIG_DIR", default_value = "config")]
    pub config_dir: String,

    /// 日志级别
    #[arg(long, env = "APP_CLI_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Assign a default role to every user without one
    #[command(name = "users:assign-roles")]
    AssignRoles {
        /// Role given to users whose email does not contain "admin"
        #[arg(long, default_value = USER_ROLE)]
        role: String,
    },
    /// Clear the cached permission sets
    #[command(name = "permissions:clear-cache")]
    ClearPermissionCache,
    /// Forget cached catalog listings, stats and select lists
    #[command(name = "cache:clear-catalog")]
    ClearCatalogCache,
    /// Create the default roles and their permissions
    #[command(name = "roles:seed")]
    SeedRoles,
}

/// 执行命令，返回进程退出码
pub async fn run(command: &Command, maintenance: &Maintenance, out: &mut impl Write) -> io::Result<u8> {
    match command {
        Command::AssignRoles { role } => match maintenance.assign_missing_roles(role).await {
            Ok(report) if report.is_empty() => {
                writeln!(out, "All users already have a role.")?;
                Ok(0)
            }
            Ok(report) => {
                for assignment in &report.assigned {
                    writeln!(
                        out,
                        "Assigned role '{}' to {} <{}>",
                        assignment.role, assignment.name, assignment.email
                    )?;
                }
                for failure in &report.failures {
                    writeln!(
                        out,
                        "Failed to assign a role to {} <{}>: {}",
                        failure.name, failure.email, failure.reason
                    )?;
                }
                writeln!(out, "{} user(s) updated.", report.assigned.len())?;
                Ok(if report.failures.is_empty() { 0 } else { 1 })
            }
            Err(e) => {
                writeln!(out, "{}", e)?;
                Ok(1)
            }
        },
        Command::ClearPermissionCache => match maintenance.clear_permission_cache().await {
            Ok(()) => {
                writeln!(out, "Permission cache cleared.")?;
                Ok(0)
            }
            Err(e) => {
                writeln!(out, "Failed to clear permission cache: {}", e)?;
                Ok(1)
            }
        },
        Command::ClearCatalogCache => {
            let failures = maintenance.clear_catalog_cache().await;
            if failures == 0 {
                writeln!(out, "Catalog cache cleared.")?;
            } else {
                writeln!(out, "Catalog cache cleared with {} failed key(s).", failures)?;
            }
            Ok(0)
        }
        Command::SeedRoles => match maintenance.seed_roles().await {
            Ok(report) => {
                for name in &report.created {
                    writeln!(out, "Created role '{}'", name)?;
                }
                for name in &report.updated {
                    writeln!(out, "Updated role '{}'", name)?;
                }
                writeln!(out, "Default roles are up to date.")?;
                Ok(0)
            }
            Err(e) => {
                writeln!(out, "{}", e)?;
                Ok(1)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assign_roles_default() {
        let cli = Cli::try_parse_from(["autogestor-cli", "users:assign-roles"]).unwrap();
        assert_eq!(
            cli.command,
            Command::AssignRoles {
                role: "user".to_string()
            }
        );
    }

    #[test]
    fn test_parse_assign_roles_custom_role() {
        let cli =
            Cli::try_parse_from(["autogestor-cli", "users:assign-roles", "--role=staff"]).unwrap();
        assert_eq!(
            cli.command,
            Command::AssignRoles {
                role: "staff".to_string()
            }
        );
    }

    #[test]
    fn test_parse_other_commands() {
        let cli = Cli::try_parse_from(["autogestor-cli", "permissions:clear-cache"]).unwrap();
        assert_eq!(cli.command, Command::ClearPermissionCache);
        let cli = Cli::try_parse_from(["autogestor-cli", "cache:clear-catalog"]).unwrap();
        assert_eq!(cli.command, Command::ClearCatalogCache);
        let cli = Cli::try_parse_from(["autogestor-cli", "roles:seed"]).unwrap();
        assert_eq!(cli.command, Command::SeedRoles);
        assert!(Cli::try_parse_from(["autogestor-cli", "users:fly"]).is_err());
    }
}
