// lib.rs — 壁纸获取流水线
// 根据关键词从图片源取图，按内容寻址保存，再交给壁纸工具设置

pub mod cancel;
pub mod config;
pub mod error;
pub mod output;
pub mod phrase;
pub mod service;
pub mod setter;
pub mod source;
pub mod store;

pub use cancel::{CancelHandle, CancelToken};
pub use error::{Error, Result};
pub use output::{Monitor, Resolution};
pub use phrase::{FixedPhrase, PhraseSource, RandomPhrase};
pub use service::{UpdateParams, WallpaperService};
pub use setter::{SetterKind, WallpaperSetter};
pub use source::{Image, ImageSource, Source, SourceKind, SourceSettings};
pub use store::{ContentStore, Stored};
