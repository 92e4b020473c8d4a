use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Yatube binary.
#[derive(Debug, Parser)]
#[command(name = "yatube", version, about = "Yatube community blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YATUBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and administrative HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Manage user accounts.
    Users(UsersArgs),
    /// Manage groups.
    Groups(GroupsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of posts shown per page.
    #[arg(long = "site-page-size", value_name = "COUNT")]
    pub site_page_size: Option<u64>,

    /// Toggle the home page cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override how long a cached home page is served.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the header carrying the authenticated username.
    #[arg(long = "auth-user-header", value_name = "HEADER")]
    pub auth_user_header: Option<String>,

    /// Redirect anonymous visitors of protected pages to this login URL.
    #[arg(long = "auth-login-url", value_name = "URL")]
    pub auth_login_url: Option<String>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum UsersCommand {
    /// Create a user account.
    Create(CreateUserArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateUserArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "USERNAME")]
    pub username: String,

    #[arg(long = "first-name", value_name = "NAME", default_value = "")]
    pub first_name: String,

    #[arg(long = "last-name", value_name = "NAME", default_value = "")]
    pub last_name: String,

    #[arg(long, value_name = "EMAIL", default_value = "")]
    pub email: String,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum GroupsCommand {
    /// Create a group.
    Create(CreateGroupArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateGroupArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "TITLE")]
    pub title: String,

    /// Derived from the title when omitted.
    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,

    #[arg(long, value_name = "TEXT", default_value = "")]
    pub description: String,
}
