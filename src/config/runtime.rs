// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::Config;
use crate::crypto::KeyStore;
use crate::decoders::default_plugins;
use crate::engine::{Converter, ModificationRegistry, Modifier, PluginPipeline};
use crate::errors::ConfigError;
use crate::observability::messages::validation::{PipelineResolved, PipelineValidationFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::ConversionPlugin;
use crate::writers::WriterRegistry;

/// Everything needed to convert and rewrite messages, wired together.
///
/// The key store, pipeline and writers are read-only and shared; the registry
/// is the only state that changes between messages.
pub struct Runtime {
    pub keys: Arc<KeyStore>,
    pub pipeline: Arc<PluginPipeline>,
    pub writers: Arc<WriterRegistry>,
    pub converter: Arc<Converter>,
    pub modifier: Modifier,
    pub registry: ModificationRegistry,
}

/// Runtime builder - orchestrates key store, plugin pipeline, converter and
/// modifier creation from configuration.
///
/// # Examples
///
/// ```
/// use wiretree::config::{Config, RuntimeBuilder};
///
/// let config: Config = serde_yaml::from_str("conversion: {lenient: false}").unwrap();
/// let runtime = RuntimeBuilder::from_config(&config).unwrap();
///
/// assert!(!runtime.converter.settings().lenient);
/// assert!(runtime.registry.is_empty());
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a runtime with the built-in decoders and writers.
    pub fn from_config(cfg: &Config) -> Result<Runtime, ConfigError> {
        Self::with_plugins(cfg, default_plugins())
    }

    /// Build a runtime around an explicit plugin set. The plugin graph is
    /// validated here; every problem found is reported at once.
    pub fn with_plugins(
        cfg: &Config,
        plugins: Vec<Arc<dyn ConversionPlugin>>,
    ) -> Result<Runtime, ConfigError> {
        let keys = Arc::new(cfg.key_store()?);

        let pipeline = match PluginPipeline::new(plugins) {
            Ok(pipeline) => {
                PipelineResolved {
                    order: &pipeline.ids(),
                }
                .log();
                Arc::new(pipeline)
            }
            Err(errors) => {
                PipelineValidationFailed { errors: &errors }.log();
                return Err(ConfigError::InvalidPipeline(errors));
            }
        };

        let writers = Arc::new(WriterRegistry::with_defaults());
        let converter = Arc::new(Converter::new(
            pipeline.clone(),
            keys.clone(),
            cfg.conversion.settings(),
        ));
        let modifier = Modifier::new(converter.clone(), writers.clone());

        let registry = ModificationRegistry::new();
        for modification in cfg.modifications() {
            registry.register(modification);
        }

        Ok(Runtime {
            keys,
            pipeline,
            writers,
            converter,
            modifier,
            registry,
        })
    }
}
