//! LifeTime Deploy - pipeline steps for LifeTime deployment plans
//!
//! Each subcommand is one CI/CD pipeline step. Exit codes: 0 success,
//! 1 deployment failure, timeout or conflict, 2 usage, config or API error.

#![forbid(unsafe_code)]

mod commands;

use clap::{Args, Parser, Subcommand};
use ltd_common::cache::DEFAULT_ARTIFACT_DIR;
use ltd_common::endpoint::{
    DEFAULT_LT_API_ENDPOINT, DEFAULT_PROBE_API_ENDPOINT, DEFAULT_PROBE_API_VERSION,
};
use ltd_common::logging::{LogConfig, LogFormat, init_logging};
use ltd_common::manifest::MERGED_MANIFEST_FILE;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for usage, configuration and API errors.
const EXIT_ERROR: u8 = 2;

const DEFAULT_TAG_LOG_MESSAGE: &str =
    "Version created automatically using outsystems-pipeline package.";

#[derive(Parser)]
#[command(name = "ltd")]
#[command(
    author,
    version,
    about = "LifeTime Deploy - pipeline steps for LifeTime deployment plans"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Connection, config and logging flags shared by every step.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory for cached API responses and exported packages
    #[arg(long, global = true, default_value = DEFAULT_ARTIFACT_DIR)]
    pub artifacts: PathBuf,

    /// LifeTime host (with or without the http(s):// prefix)
    #[arg(long, global = true, env = "LTD_LT_URL")]
    pub lt_url: Option<String>,

    /// LifeTime service account token
    #[arg(long, global = true, env = "LTD_LT_TOKEN", hide_env_values = true)]
    pub lt_token: Option<String>,

    /// LifeTime API version (1 or 2)
    #[arg(long, global = true, default_value_t = 2)]
    pub lt_api_version: u8,

    /// LifeTime API endpoint path
    #[arg(long, global = true, default_value = DEFAULT_LT_API_ENDPOINT)]
    pub lt_endpoint: String,

    /// Pipeline tunables (TOML or KEY=VALUE file)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Trigger manifest input, inline or from a file.
#[derive(Args, Debug, Clone, Default)]
pub struct TriggerManifestArgs {
    /// Trigger manifest as inline JSON (takes precedence over --manifest-file)
    #[arg(long, env = "LTD_TRIGGER_MANIFEST", hide_env_values = true)]
    pub trigger_manifest: Option<String>,

    /// Path to a trigger manifest file
    #[arg(long)]
    pub manifest_file: Option<PathBuf>,
}

/// CI/CD probe connection used for dependency lookups.
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// CI/CD probe host (defaults to the LifeTime host)
    #[arg(long, env = "LTD_PROBE_URL")]
    pub probe_url: Option<String>,

    /// CI/CD probe API endpoint path
    #[arg(long, default_value = DEFAULT_PROBE_API_ENDPOINT)]
    pub probe_endpoint: String,

    /// CI/CD probe API version
    #[arg(long, default_value_t = DEFAULT_PROBE_API_VERSION)]
    pub probe_version: u8,

    /// Value for the x-cicdprobe-key header
    #[arg(long, env = "LTD_PROBE_KEY", hide_env_values = true)]
    pub probe_key: Option<String>,
}

/// Flags shared by the plan-creating steps.
#[derive(Args, Debug, Clone, Copy)]
pub struct DeployFlags {
    /// Continue two-step deployments past the prepare step
    #[arg(long)]
    pub force_two_step: bool,

    /// Do not wait for other deployments to the destination to finish
    #[arg(long)]
    pub allow_parallel: bool,

    /// Deploy to the deployment zones of the source applications
    #[arg(long)]
    pub include_deployment_zones: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the versions running in the source environment
    DeployLatestTags {
        /// Source environment name
        #[arg(short, long)]
        source_env: String,

        /// Destination environment name
        #[arg(short, long)]
        destination_env: String,

        /// Comma-separated application names
        #[arg(short = 'l', long, value_delimiter = ',', required = true)]
        app_list: Vec<String>,

        /// Deployment manifest pinning the versions to deploy
        #[arg(short = 'f', long)]
        manifest_file: Option<PathBuf>,

        #[command(flatten)]
        flags: DeployFlags,
    },

    /// Deploy the versions pinned by a trigger manifest
    DeployTagsWithManifest {
        /// Source environment label in the manifest
        #[arg(short, long)]
        source_env_label: String,

        /// Destination environment label in the manifest
        #[arg(short, long)]
        destination_env_label: String,

        /// Also deploy applications flagged as test applications
        #[arg(long)]
        include_test_apps: bool,

        #[command(flatten)]
        manifest: TriggerManifestArgs,

        #[command(flatten)]
        flags: DeployFlags,
    },

    /// Resume a prepared two-step deployment
    ContinueDeployment {
        /// Destination environment name
        #[arg(short, long)]
        destination_env: String,
    },

    /// Deploy an .osp or .oap package file
    DeployPackage {
        /// Destination environment label in the trigger manifest
        #[arg(long, conflicts_with = "destination_env")]
        destination_env_label: Option<String>,

        /// Destination environment name
        #[arg(short, long, required_unless_present = "destination_env_label")]
        destination_env: Option<String>,

        /// Package file to deploy
        #[arg(short, long)]
        package_path: PathBuf,

        #[command(flatten)]
        manifest: TriggerManifestArgs,

        #[command(flatten)]
        flags: DeployFlags,
    },

    /// Run an existing deployment plan
    DeployFromPlan {
        /// Deployment plan key
        #[arg(short, long)]
        plan_key: String,

        /// Destination environment name
        #[arg(short, long)]
        destination_env: String,
    },

    /// Cache environments and applications
    FetchLifetimeData,

    /// Tag deployed applications with their manifest versions
    TagApps {
        /// Destination environment name
        #[arg(short, long)]
        destination_env: String,

        /// Comma-separated application names
        #[arg(short = 'l', long, value_delimiter = ',', required = true)]
        app_list: Vec<String>,

        /// Deployment manifest with the versions to tag
        #[arg(short = 'f', long)]
        manifest_file: PathBuf,
    },

    /// Tag applications changed in an environment with the next free version number
    TagModifiedApps {
        /// Environment name where the applications changed
        #[arg(short, long)]
        destination_env: String,

        /// Comma-separated application names
        #[arg(short = 'l', long, value_delimiter = ',')]
        app_list: Vec<String>,

        /// Change log of the new versions
        #[arg(long, default_value = DEFAULT_TAG_LOG_MESSAGE)]
        log_msg: String,

        #[command(flatten)]
        manifest: TriggerManifestArgs,
    },

    /// Start the deployment plan saved for an environment
    StartSavedPlan {
        /// Destination environment name
        #[arg(short, long)]
        destination_env: String,
    },

    /// Check that every manifest application exists in an environment
    ValidateManifestApps {
        /// Environment label in the manifest
        #[arg(short, long)]
        env_label: String,

        /// Also check applications flagged as test applications
        #[arg(long)]
        include_test_apps: bool,

        #[command(flatten)]
        manifest: TriggerManifestArgs,
    },

    /// Export application packages, optionally with a deployment order
    FetchAppsPackages {
        /// Source environment name
        #[arg(short, long)]
        source_env: String,

        /// Comma-separated application names
        #[arg(short = 'l', long, value_delimiter = ',')]
        app_list: Vec<String>,

        /// Also export applications flagged as test applications
        #[arg(long)]
        include_test_apps: bool,

        /// Name packages `App_Name_v1_2_3.oap` instead of by version key
        #[arg(long)]
        friendly_package_names: bool,

        /// Sort packages by their producer dependencies
        #[arg(long)]
        generate_deploy_order: bool,

        #[command(flatten)]
        manifest: TriggerManifestArgs,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Trigger manifest tools
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Show the error catalog, or one entry in full
    Errors {
        /// Error code, e.g. LTD-E201
        code: Option<String>,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Build a trigger manifest from the versions running in an environment
    Generate {
        /// Source environment name
        #[arg(short, long)]
        source_env: String,

        /// Comma-separated application names
        #[arg(short = 'l', long, value_delimiter = ',', required = true)]
        app_list: Vec<String>,

        /// Deployment notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Merge every *.json manifest in a folder
    Merge {
        /// Folder holding the manifests
        #[arg(long)]
        folder: PathBuf,

        /// Output file
        #[arg(short, long, default_value = MERGED_MANIFEST_FILE)]
        output: PathBuf,
    },

    /// Print the JSON schema of the trigger manifest
    Schema,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().with_verbosity(cli.global.verbose, cli.global.quiet);
    if let Some(format) = cli.global.log_format {
        log_config.format = format;
    }
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{}", commands::helpers::describe_error(&err.into()));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{}", commands::helpers::describe_error(&err));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let global = cli.global;
    match cli.command {
        Commands::DeployLatestTags {
            source_env,
            destination_env,
            app_list,
            manifest_file,
            flags,
        } => {
            commands::deploy::deploy_latest_tags(
                &global,
                &source_env,
                &destination_env,
                &app_list,
                manifest_file.as_deref(),
                flags.into(),
            )
            .await
        }
        Commands::DeployTagsWithManifest {
            source_env_label,
            destination_env_label,
            include_test_apps,
            manifest,
            flags,
        } => {
            commands::deploy::deploy_tags_with_manifest(
                &global,
                &manifest,
                &source_env_label,
                &destination_env_label,
                include_test_apps,
                flags.into(),
            )
            .await
        }
        Commands::ContinueDeployment { destination_env } => {
            commands::deploy::continue_deployment(&global, &destination_env).await
        }
        Commands::DeployPackage {
            destination_env_label,
            destination_env,
            package_path,
            manifest,
            flags,
        } => {
            let destination = match (destination_env_label, destination_env) {
                (Some(label), _) => commands::deploy::Destination::Label(label),
                (None, Some(name)) => commands::deploy::Destination::Name(name),
                (None, None) => {
                    anyhow::bail!("either --destination-env-label or --destination-env is required")
                }
            };
            commands::deploy::deploy_package(
                &global,
                &manifest,
                destination,
                &package_path,
                flags.into(),
            )
            .await
        }
        Commands::DeployFromPlan {
            plan_key,
            destination_env,
        } => commands::deploy::deploy_from_plan(&global, &plan_key, &destination_env).await,
        Commands::FetchLifetimeData => commands::fetch::fetch_lifetime_data(&global).await,
        Commands::TagApps {
            destination_env,
            app_list,
            manifest_file,
        } => commands::tag::tag_apps(&global, &destination_env, &app_list, &manifest_file).await,
        Commands::TagModifiedApps {
            destination_env,
            app_list,
            log_msg,
            manifest,
        } => {
            commands::tag::tag_modified_apps(
                &global,
                &destination_env,
                &app_list,
                &manifest,
                &log_msg,
            )
            .await
        }
        Commands::StartSavedPlan { destination_env } => {
            commands::deploy::start_saved_plan(&global, &destination_env).await
        }
        Commands::ValidateManifestApps {
            env_label,
            include_test_apps,
            manifest,
        } => {
            commands::fetch::validate_manifest_apps(
                &global,
                &manifest,
                &env_label,
                include_test_apps,
            )
            .await
        }
        Commands::FetchAppsPackages {
            source_env,
            app_list,
            include_test_apps,
            friendly_package_names,
            generate_deploy_order,
            manifest,
            probe,
        } => {
            let request = commands::fetch::PackagesRequest {
                source_env,
                app_list,
                include_test_apps,
                friendly_package_names,
                generate_deploy_order,
            };
            commands::fetch::fetch_apps_packages(&global, &manifest, &probe, request).await
        }
        Commands::Manifest { action } => match action {
            ManifestAction::Generate {
                source_env,
                app_list,
                notes,
            } => commands::manifest::generate(&global, &source_env, &app_list, &notes).await,
            ManifestAction::Merge { folder, output } => commands::manifest::merge(&folder, &output),
            ManifestAction::Schema => commands::manifest::schema(),
        },
        Commands::Errors { code } => commands::errors::show(code.as_deref()),
    }
}

impl From<DeployFlags> for ltd_common::deploy::DeployOptions {
    fn from(flags: DeployFlags) -> Self {
        Self {
            force_two_step: flags.force_two_step,
            allow_parallel: flags.allow_parallel,
            include_deployment_zones: flags.include_deployment_zones,
        }
    }
}
