use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use gridapp_core::{GridAppConfig, ItemId};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gridapp")]
#[command(version, about = "In-store gridapp display.")]
pub struct Cli {
    /// Use local fallback settings instead of the hub runtime
    #[arg(long)]
    pub dev: bool,

    /// Fallback settings document used in dev mode
    #[arg(long, value_name = "PATH", env = "GRIDAPP_SETTINGS_PATH")]
    pub settings: Option<PathBuf>,

    /// Product identifier used for add-to-cart and the cart count
    #[arg(long, value_name = "ID", value_parser = NonEmptyStringValueParser::new())]
    pub product_id: Option<String>,

    /// Serve settings from this document through an in-process hub runtime
    #[arg(long, value_name = "PATH")]
    pub local_hub: Option<PathBuf>,

    /// Directory to load .env files from (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub env_dir: Option<PathBuf>,
}

impl Cli {
    /// Applies command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut GridAppConfig) {
        if self.dev {
            config.dev_mode = true;
        }
        if let Some(path) = &self.settings {
            config.fallback_settings_path.clone_from(path);
        }
        if let Some(id) = &self.product_id {
            config.product_id = ItemId::new(id.as_str());
        }
    }
}
