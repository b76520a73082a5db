//! Typed - 型付き Controller API
//!
//! `"Controller@method"` 形式の参照を、ホストが登録した Controller に
//! 名前で解決します。リフレクションや DI コンテナは使いません。
//!
//! # 二層構造
//! - **表層（Typed）**: `Controller` trait - 型安全
//! - **内部（Dyn）**: `DynController` trait - object-safe, type erasure

pub mod controller;
pub mod registry;

pub use self::controller::{Controller, ControllerMiddleware, DynController, TypedController};
pub use self::registry::{ControllerRegistry, RegistryError};
