//! PiperBuilder - 起動時のワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use tracing::info;

use super::group::GroupAttributes;
use super::manifest::{ManifestError, PipeManifest};
use super::piper::Piper;
use crate::config::PiperConfig;
use crate::domain::{Middleware, MiddlewareRef, PipeError, PipeRequest, Response};
use crate::typed::{Controller, RegistryError};

/// # 使用例
/// ```ignore
/// let piper = PiperBuilder::new(config)
///     .controller(PingController)?
///     .middleware("auth", auth_middleware())
///     .pipes(|p| {
///         p.match_pipe("text", "ping", "PingController")?;
///         Ok(())
///     })?
///     .verify_actions()
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - pipe の登録エラーはその場で返す
/// - verify_actions() を呼ぶと、build() 時に全 controller 参照の解決を確認
pub struct PiperBuilder {
    config: PiperConfig,
    piper: Piper,
    verify_actions: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Unresolved pipe actions: {0:?}. These controllers or methods are not registered.")]
    UnresolvedActions(Vec<String>),

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl PiperBuilder {
    pub fn new(config: PiperConfig) -> Self {
        Self {
            config,
            piper: Piper::new(),
            verify_actions: false,
        }
    }

    pub fn config(&self) -> &PiperConfig {
        &self.config
    }

    pub fn controller<C: Controller>(mut self, controller: C) -> Result<Self, BuildError> {
        self.piper.register_controller(controller)?;
        Ok(self)
    }

    pub fn middleware(mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.piper.alias_middleware(name, middleware);
        self
    }

    pub fn middleware_group<I, M>(mut self, name: impl Into<String>, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.piper.middleware_group(name, middleware);
        self
    }

    pub fn response_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&PipeRequest) -> Response + Send + Sync + 'static,
    {
        self.piper.set_response_resolver(resolver);
        self
    }

    /// Register pipes in code, under the configured namespace.
    pub fn pipes<F>(mut self, body: F) -> Result<Self, BuildError>
    where
        F: FnOnce(&mut Piper) -> Result<(), PipeError>,
    {
        let root = self.root_attributes();
        self.piper.group(root, body)?;
        Ok(self)
    }

    /// Register the pipes of a parsed manifest, under the configured namespace.
    pub fn manifest(mut self, manifest: &PipeManifest) -> Result<Self, BuildError> {
        let root = self.root_attributes();
        self.piper.group(root, |piper| manifest.register(piper))?;
        Ok(self)
    }

    /// Make `build` fail when a pipe names an unregistered controller or method.
    pub fn verify_actions(mut self) -> Self {
        self.verify_actions = true;
        self
    }

    /// # 検証
    /// - `load_pipes_file` が有効なら `pipes_file` を読み込んで登録
    /// - verify_actions() が呼ばれていれば、全 controller 参照が解決できるかチェック
    pub fn build(mut self) -> Result<Piper, BuildError> {
        if self.config.load_pipes_file {
            let manifest = PipeManifest::from_path(&self.config.pipes_file)?;
            self = self.manifest(&manifest)?;
        }

        if self.verify_actions {
            let controllers = self.piper.controllers();
            let unresolved: Vec<String> = self
                .piper
                .pipes()
                .iter()
                .filter_map(|pipe| pipe.action().as_controller())
                .filter(|action| !controllers.resolves(action))
                .map(ToString::to_string)
                .collect();
            if !unresolved.is_empty() {
                return Err(BuildError::UnresolvedActions(unresolved));
            }
        }

        info!(
            pipes = self.piper.pipes().len(),
            controllers = self.piper.controllers().len(),
            "piper built"
        );
        Ok(self.piper)
    }

    fn root_attributes(&self) -> GroupAttributes {
        GroupAttributes {
            namespace: self.config.namespace.clone(),
            ..GroupAttributes::default()
        }
    }
}

impl Default for PiperBuilder {
    fn default() -> Self {
        Self::new(PiperConfig::default())
    }
}
