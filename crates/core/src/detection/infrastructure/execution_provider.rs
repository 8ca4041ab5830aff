use ort::execution_providers::ExecutionProviderDispatch;

/// Name of the accelerator tried before falling back to CPU.
pub fn accelerator_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "CoreML"
    } else if cfg!(target_os = "windows") {
        "DirectML"
    } else {
        "CPU"
    }
}

/// Execution providers for a detector session, in priority order.
///
/// An empty list leaves ONNX Runtime on its default CPU provider, which is
/// also where it lands if the platform accelerator fails to register.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    log::debug!("requesting {} execution provider", accelerator_name());

    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accelerator_matches_provider_list() {
        let providers = preferred_execution_providers();
        if accelerator_name() == "CPU" {
            assert!(providers.is_empty());
        } else {
            assert_eq!(providers.len(), 1);
        }
    }
}
