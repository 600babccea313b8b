use std::{cell::RefCell, ffi::OsStr};

use crate::asm::{AsmOptions, OffsetMode};

#[derive(Clone, Copy)]
struct Env {
    strict: bool,
    offsets: OffsetMode,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read `LC3_STRICT` and `LC3_OFFSETS` from the process environment.
pub fn init() {
    let offsets = if var_is("LC3_OFFSETS", "absolute") {
        OffsetMode::Absolute
    } else {
        OffsetMode::Relative
    };
    let value = Env {
        strict: var_is("LC3_STRICT", "1"),
        offsets,
    };
    set_env(value);
}

pub fn is_strict() -> bool {
    with_env(|env| env.strict)
}

pub fn offset_mode() -> OffsetMode {
    with_env(|env| env.offsets)
}

/// Assembler options taken from the environment.
pub fn asm_options() -> AsmOptions {
    AsmOptions {
        offsets: offset_mode(),
        strict: is_strict(),
    }
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v.eq_ignore_ascii_case(value.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_variables() {
        // Each test runs on its own thread, so the state is fresh here
        set_env(Env {
            strict: false,
            offsets: OffsetMode::Relative,
        });
        assert_eq!(asm_options(), AsmOptions::default());
    }

    #[test]
    #[should_panic(expected = "before initialization")]
    fn access_before_init() {
        is_strict();
    }
}
