//! Error macros for feather

/// Macro for creating invalid value errors
#[macro_export]
macro_rules! bail_invalid {
    ($context:expr, $value:expr) => {
        return Err($crate::error::FeatherError::invalid_value($context, $value))
    };
}

/// Macro for creating usage errors
#[macro_export]
macro_rules! bail_usage {
    ($msg:expr) => {
        return Err($crate::error::FeatherError::UsageError($msg.to_string()))
    };
}

/// Macro for mapping errors from a host request
#[macro_export]
macro_rules! map_host_err {
    ($op:expr, $error:expr) => {
        $crate::error::FeatherError::host($op, $error)
    };
}
