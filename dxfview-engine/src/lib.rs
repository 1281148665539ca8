//! 视口引擎：坐标变换、视图导航、对象捕捉、选择、测量与图层隔离。

pub mod command;
pub mod engine;
pub mod interaction;
pub mod isolation;
pub mod measure;
pub mod navigation;
pub mod selection;
pub mod snap;
pub mod surface;
pub mod transform;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum EngineError {
        #[error("unknown view cube orientation: {0}")]
        UnknownOrientation(String),
        #[error("unknown measurement mode: {0}")]
        UnknownMeasurementMode(String),
        #[error("unknown command: {0}")]
        UnknownCommand(String),
        #[error("no command bound to key {0}")]
        UnboundKey(String),
        #[error("command {command} requires argument <{argument}>")]
        MissingArgument {
            command: &'static str,
            argument: &'static str,
        },
    }
}

pub use engine::{EngineSettings, ViewportControl, ViewportEngine, ViewportEvent};
pub use errors::EngineError;
pub use navigation::{Pane, TabId, ViewKey};
pub use surface::{DocumentProvider, InMemoryDocuments, RenderingSurface, SoftwareSurface};
