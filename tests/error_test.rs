use muninn::{MuninnError, Result};

#[test]
fn test_error_display() {
    let err = MuninnError::Api {
        status: 422,
        message: "natOp is required".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("422"));
    assert!(text.contains("natOp is required"));
}

#[test]
fn test_superseded_display() {
    let err = MuninnError::Superseded;
    assert!(err.to_string().contains("superseded"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(MuninnError::Storage("read-only filesystem".into()))
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Status extraction
// ============================================================================

#[test]
fn api_errors_carry_status() {
    let err = MuninnError::Api {
        status: 404,
        message: "Not Found".into(),
    };
    assert_eq!(err.status(), Some(404));
}

#[test]
fn other_errors_carry_no_status() {
    assert_eq!(MuninnError::Http("connection reset".into()).status(), None);
    assert_eq!(MuninnError::Superseded.status(), None);
    assert_eq!(MuninnError::Storage("disk full".into()).status(), None);
    assert_eq!(MuninnError::Configuration("bad url".into()).status(), None);
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn json_errors_convert() {
    let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{oops");
    let err: MuninnError = parse.unwrap_err().into();
    assert!(matches!(err, MuninnError::Json(_)));
    assert!(err.to_string().starts_with("JSON error"));
}
