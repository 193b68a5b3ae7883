//! `KernelManager` selection and `VCONV_*` environment handling.

use serial_test::serial;
use vconv_common::{KernelConfig, KernelError, SimdLevel};
use vconv_kernels::{KernelManager, Variant, global_manager, runtime_simd_level, select_cpu_kernel};

const ENV_KEYS: [&str; 4] =
    ["VCONV_KERNEL_VARIANT", "VCONV_MAX_SIMD", "VCONV_TOLERANCE_REL", "VCONV_TOLERANCE_ABS"];

fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let settings: Vec<(&str, Option<&str>)> = ENV_KEYS
        .iter()
        .map(|key| (*key, vars.iter().find(|(k, _)| k == key).map(|(_, v)| *v)))
        .collect();
    temp_env::with_vars(settings, f)
}

#[test]
fn scalar_manager_uses_naive() {
    let manager = KernelManager::with_level(SimdLevel::Scalar, &KernelConfig::default());
    assert_eq!(manager.simd_level(), SimdLevel::Scalar);
    assert_eq!(manager.select(16).unwrap(), Variant::Naive);
    assert_eq!(manager.list_available_variants(), ["naive", "reversed_naive"]);

    let mut out = [0.0; 3];
    manager.convolve(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0], &mut out).unwrap();
    assert_eq!(out, [3.0, 5.0, 7.0]);
}

#[cfg(target_arch = "x86_64")]
#[test]
fn selection_follows_kernel_length() {
    let manager = KernelManager::with_level(SimdLevel::Sse, &KernelConfig::default());
    assert_eq!(manager.select(16).unwrap(), Variant::SseUnrolledVector);
    assert_eq!(manager.select(8).unwrap(), Variant::SseInAligned);
    assert_eq!(manager.select(3).unwrap(), Variant::SseSimple);
}

#[test]
fn requested_level_is_capped_at_the_running_cpu() {
    let manager = KernelManager::with_level(SimdLevel::AvxFma, &KernelConfig::default());
    assert_eq!(manager.simd_level(), runtime_simd_level());
    for kernel_len in [3, 8, 16] {
        let variant = manager.select(kernel_len).unwrap();
        assert!(variant.is_supported_on(runtime_simd_level()), "{variant}");
    }
    let mut out = [0.0; 5];
    manager.convolve(&[2.0; 20], &[0.5; 16], &mut out).unwrap();
    assert_eq!(out, [16.0; 5]);
}

#[test]
fn concurrent_calls_with_separate_outputs_match_naive() {
    let manager = KernelManager::with_config(&KernelConfig::default());
    // quarter-integer data keeps every summation order exact
    let input: Vec<f32> = (0..203).map(|x| ((x * 7) % 13) as f32 * 0.25 - 1.5).collect();
    let kernel: Vec<f32> = (0..16).map(|k| (k % 5) as f32 * 0.25 - 0.5).collect();
    let mut expected = vec![0.0; input.len() - kernel.len() + 1];
    Variant::Naive.convolve(&input, &kernel, &mut expected).unwrap();
    let variants: Vec<Variant> = Variant::ALL
        .into_iter()
        .filter(|v| v.is_supported_on(runtime_simd_level()) && v.accepts_kernel_len(kernel.len()))
        .collect();

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|thread| {
                let (manager, input, kernel, expected, variants) =
                    (&manager, &input, &kernel, &expected, &variants);
                scope.spawn(move || {
                    let mut out = vec![0.0; expected.len()];
                    for round in 0..50 {
                        out.fill(f32::NAN);
                        let pick = (thread + round) % (variants.len() + 1);
                        match variants.get(pick) {
                            Some(variant) => variant.convolve(input, kernel, &mut out).unwrap(),
                            None => manager.convolve(input, kernel, &mut out).unwrap(),
                        }
                        assert_eq!(&out, expected, "thread {thread} round {round}");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    });
    assert!(manager.selected_variant_name().is_some());
}

#[test]
fn selected_name_tracks_last_selection() {
    let manager = KernelManager::with_level(SimdLevel::Scalar, &KernelConfig::default());
    assert_eq!(manager.selected_variant_name(), None);
    manager.select(5).unwrap();
    assert_eq!(manager.selected_variant_name(), Some("naive"));
}

#[test]
fn zero_length_kernel_cannot_be_selected() {
    let manager = KernelManager::with_level(SimdLevel::Scalar, &KernelConfig::default());
    let err = manager.select(0).unwrap_err();
    assert!(matches!(err.as_kernel(), Some(KernelError::InvalidArgument { .. })));
}

#[test]
fn manager_checks_shapes_before_selecting() {
    let manager = KernelManager::with_config(&KernelConfig::default());
    let mut out = [0.0; 2];
    let err = manager.convolve(&[1.0; 20], &[1.0; 16], &mut out).unwrap_err();
    assert_eq!(err.as_kernel(), Some(&KernelError::LengthMismatch { expected: 5, actual: 2 }));
    assert_eq!(manager.selected_variant_name(), None);
}

#[test]
fn detected_manager_runs_what_it_selects() {
    let manager = KernelManager::with_config(&KernelConfig::default());
    assert_eq!(manager.simd_level(), runtime_simd_level());
    let input: Vec<f32> = (0..50).map(|x| x as f32).collect();
    let mut kernel = [0.0f32; 16];
    kernel[15] = 1.0;
    let mut out = vec![0.0; 35];
    manager.convolve(&input, &kernel, &mut out).unwrap();
    assert_eq!(out, input[..35]);
    let name = manager.selected_variant_name().unwrap();
    assert!(manager.list_available_variants().contains(&name));
}

#[test]
#[serial(vconv_env)]
fn env_variant_is_preferred() {
    let manager = with_env(&[("VCONV_KERNEL_VARIANT", "reversed_naive")], KernelManager::new);
    assert_eq!(manager.table().entries()[0], Variant::ReversedNaive);
    assert_eq!(manager.select(16).unwrap(), Variant::ReversedNaive);
}

#[test]
#[serial(vconv_env)]
fn env_ceiling_forces_scalar() {
    let manager = with_env(&[("VCONV_MAX_SIMD", "scalar")], KernelManager::new);
    assert_eq!(manager.simd_level(), SimdLevel::Scalar);
    assert_eq!(manager.select(16).unwrap(), Variant::Naive);
}

#[test]
#[serial(vconv_env)]
fn invalid_env_falls_back_to_defaults() {
    let manager = with_env(&[("VCONV_MAX_SIMD", "avx512")], KernelManager::new);
    assert_eq!(manager.simd_level(), runtime_simd_level());
}

#[test]
#[serial(vconv_env)]
fn select_cpu_kernel_returns_available_provider() {
    let provider = with_env(&[], || select_cpu_kernel(16)).unwrap();
    assert!(provider.is_available());
    let mut out = [0.0; 1];
    provider.convolve(&[1.0; 16], &[0.5; 16], &mut out).unwrap();
    assert_eq!(out, [8.0]);
}

#[test]
#[serial(vconv_env)]
fn free_convolve_uses_the_global_manager() {
    let mut out = [0.0; 2];
    with_env(&[], || vconv_kernels::convolve(&[1.0, 2.0, 3.0], &[2.0, 1.0], &mut out)).unwrap();
    assert_eq!(out, [5.0, 8.0]);
    assert!(std::ptr::eq(global_manager(), global_manager()));
    assert!(global_manager().selected_variant_name().is_some());
}
