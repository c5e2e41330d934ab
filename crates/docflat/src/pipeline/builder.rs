use crate::{
    config::DocflatConfig,
    oracles::super_resolver_from_config,
    pipeline::Pipeline,
    traits::{Segmenter, SuperResolver},
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    config: DocflatConfig,
    segmenter: Option<Box<dyn Segmenter>>,
    super_resolver: Option<Box<dyn SuperResolver>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: DocflatConfig::default(),
            segmenter: None,
            super_resolver: None,
        }
    }

    /// Use `config` for every stage (replaces any existing one)
    pub fn config(mut self, config: DocflatConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the segmentation oracle (replaces any existing one)
    pub fn segmenter<S>(mut self, segmenter: S) -> Self
    where
        S: Segmenter + 'static,
    {
        self.segmenter = Some(Box::new(segmenter));
        self
    }

    /// Set the super-resolution oracle (replaces any existing one)
    pub fn super_resolver<R>(mut self, resolver: R) -> Self
    where
        R: SuperResolver + 'static,
    {
        self.super_resolver = Some(Box::new(resolver));
        self
    }

    /// Build the pipeline. Without an explicit super-resolution oracle the
    /// one described by `config.super_resolution` is used.
    pub fn build(self) -> Pipeline {
        let super_resolver = self
            .super_resolver
            .unwrap_or_else(|| super_resolver_from_config(&self.config.super_resolution));
        Pipeline::new(self.config, self.segmenter, super_resolver)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
