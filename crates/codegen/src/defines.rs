//! Preprocessor-define encoding used by the CPU sweep.

use tiletune_space::ParameterTuple;

pub const DEFAULT_DEFINE_PREFIX: &str = "T1c";

/// One `-D<prefix><i>=<value>.0` flag per tuple value.
pub fn define_flags(prefix: &str, tuple: &ParameterTuple) -> Vec<String> {
    tuple
        .values()
        .iter()
        .enumerate()
        .map(|(i, value)| format!("-D{prefix}{i}={value}.0"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_flags() {
        let tuple = ParameterTuple::new(vec![3, 16, 28]);
        assert_eq!(
            define_flags(DEFAULT_DEFINE_PREFIX, &tuple),
            vec!["-DT1c0=3.0", "-DT1c1=16.0", "-DT1c2=28.0"]
        );
    }
}
