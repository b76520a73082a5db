//! Matching - パイプ選択のバリデータチェーン
//!
//! A pipe is selected for a request only when every validator in
//! [`VALIDATORS`] accepts it. Validators are pure predicates: they never fail
//! and never touch the pipe, so evaluating the chain twice gives the same
//! answer.
//!
//! # 構成
//! - `KeyValidator`: 監視フィールドの存在
//! - `CueValidator`: リテラル接頭辞 / alias の照合
//! - `ParameterValidator`: プレースホルダに対応するフィールドの存在
//! - `PatternValidator`: コンパイル済み regex の照合

mod cue;
mod key;
mod parameter;
mod pattern;

pub use self::cue::CueValidator;
pub use self::key::KeyValidator;
pub use self::parameter::ParameterValidator;
pub use self::pattern::PatternValidator;

use crate::domain::{Pipe, PipeRequest};

pub trait Validator: Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, pipe: &Pipe, request: &PipeRequest) -> bool;
}

/// Evaluation order. Cheap checks come first; the regex stage runs last.
pub static VALIDATORS: [&dyn Validator; 4] = [
    &KeyValidator,
    &CueValidator,
    &ParameterValidator,
    &PatternValidator,
];

pub fn all_pass(pipe: &Pipe, request: &PipeRequest) -> bool {
    VALIDATORS.iter().all(|validator| {
        let passed = validator.matches(pipe, request);
        if !passed {
            tracing::trace!(
                validator = validator.name(),
                key = pipe.key(),
                cue = pipe.cue(),
                "pipe rejected"
            );
        }
        passed
    })
}
