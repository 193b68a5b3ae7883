//! C API contract tests: signatures, status codes and error messages.

use std::ffi::{CStr, c_int};
use std::ptr;

use vconv_ffi::*;

type ConvolveFn = unsafe extern "C" fn(*const f32, *mut f32, c_int, *const f32, c_int) -> c_int;

const EXPORTED: [ConvolveFn; 15] = [
    vconv_convolve_naive,
    vconv_convolve_reversed_naive,
    vconv_convolve_sse_simple,
    vconv_convolve_sse_partial_unroll,
    vconv_convolve_sse_in_aligned,
    vconv_convolve_sse_in_aligned_fixed_kernel,
    vconv_convolve_sse_unrolled_avx_vector,
    vconv_convolve_sse_unrolled_vector,
    vconv_convolve_avx_unrolled_vector,
    vconv_convolve_avx_unrolled_vector_unaligned,
    vconv_convolve_avx_unrolled_vector_unaligned_fma,
    vconv_convolve_avx_unrolled_vector_m128_load,
    vconv_convolve_avx_unrolled_vector_aligned,
    vconv_convolve_avx_unrolled_vector_partial_aligned,
    vconv_convolve_avx_unrolled_vector_local_output,
];

fn last_error() -> String {
    let ptr = vconv_last_error();
    assert!(!ptr.is_null(), "expected an error message");
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn call(f: ConvolveFn, input: &[f32], kernel: &[f32], out: &mut [f32]) -> c_int {
    unsafe { f(input.as_ptr(), out.as_mut_ptr(), input.len() as c_int, kernel.as_ptr(), kernel.len() as c_int) }
}

#[test]
fn every_variant_is_enumerated() {
    assert_eq!(vconv_variant_count(), 15);
    for i in 0..vconv_variant_count() {
        let name = unsafe { CStr::from_ptr(vconv_variant_name(i)) };
        assert!(!name.to_bytes().is_empty());
        assert!(matches!(vconv_variant_supported(i), 0 | 1));
    }
    assert!(vconv_variant_name(15).is_null());
    assert!(vconv_variant_name(-1).is_null());
    assert_eq!(vconv_variant_supported(99), VCONV_ERROR_INVALID_ARGUMENT);
}

#[test]
fn identity_kernel_through_every_supported_export() {
    let input: Vec<f32> = (1..=18).map(|x| x as f32).collect();
    let mut kernel = [0.0f32; 16];
    kernel[15] = 1.0;
    for (i, f) in EXPORTED.into_iter().enumerate() {
        let mut out = [0.0f32; 3];
        let status = call(f, &input, &kernel, &mut out);
        if vconv_variant_supported(i as c_int) == 1 {
            assert_eq!(status, VCONV_SUCCESS, "variant {i}");
            assert_eq!(out, [1.0, 2.0, 3.0], "variant {i}");
        } else {
            assert_eq!(status, VCONV_ERROR_UNSUPPORTED_HARDWARE, "variant {i}");
            assert!(last_error().contains("unsupported"), "{}", last_error());
        }
    }
}

#[test]
fn by_index_matches_named_export() {
    let input: Vec<f32> = (0..40).map(|x| (x % 5) as f32).collect();
    let kernel = [0.25f32; 16];
    for (i, f) in EXPORTED.into_iter().enumerate() {
        if vconv_variant_supported(i as c_int) != 1 {
            continue;
        }
        let mut named = [0.0f32; 25];
        let mut indexed = [0.0f32; 25];
        assert_eq!(call(f, &input, &kernel, &mut named), VCONV_SUCCESS);
        let status = unsafe {
            vconv_convolve_by_index(i as c_int, input.as_ptr(), indexed.as_mut_ptr(), 40, kernel.as_ptr(), 16)
        };
        assert_eq!(status, VCONV_SUCCESS);
        assert_eq!(named, indexed);
    }
}

#[test]
fn auto_dispatch_computes_moving_average() {
    let input = [4.0f32; 20];
    let kernel = [1.0f32 / 16.0; 16];
    let mut out = [0.0f32; 5];
    assert_eq!(call(vconv_convolve_auto, &input, &kernel, &mut out), VCONV_SUCCESS);
    assert_eq!(out, [4.0; 5]);
}

#[test]
fn null_pointers_are_rejected() {
    let data = [1.0f32; 4];
    let mut out = [0.0f32; 4];
    let status = unsafe { vconv_convolve_naive(ptr::null(), out.as_mut_ptr(), 4, data.as_ptr(), 1) };
    assert_eq!(status, VCONV_ERROR_NULL_POINTER);
    let status = unsafe { vconv_convolve_naive(data.as_ptr(), ptr::null_mut(), 4, data.as_ptr(), 1) };
    assert_eq!(status, VCONV_ERROR_NULL_POINTER);
    let status = unsafe { vconv_convolve_auto(data.as_ptr(), out.as_mut_ptr(), 4, ptr::null(), 1) };
    assert_eq!(status, VCONV_ERROR_NULL_POINTER);
    assert!(last_error().contains("non-null"));
}

#[test]
fn bad_lengths_are_invalid_arguments() {
    let data = [1.0f32; 4];
    let mut out = [0.0f32; 4];
    for (length, kernel_length) in [(4, 0), (-1, 1), (4, -2), (3, 4)] {
        let status =
            unsafe { vconv_convolve_naive(data.as_ptr(), out.as_mut_ptr(), length, data.as_ptr(), kernel_length) };
        assert_eq!(status, VCONV_ERROR_INVALID_ARGUMENT, "length={length} kernel_length={kernel_length}");
    }
    assert!(last_error().contains("exceeds input length 3"));
}

#[test]
fn fixed_kernel_export_rejects_other_kernel_lengths() {
    let input = [1.0f32; 32];
    let kernel = [1.0f32; 8];
    let mut out = [0.0f32; 25];
    let status = call(vconv_convolve_avx_unrolled_vector_aligned, &input, &kernel, &mut out);
    assert_eq!(status, VCONV_ERROR_INVALID_ARGUMENT);
    assert!(last_error().contains("kernel length 8"));
}

#[test]
fn unknown_index_is_invalid() {
    let data = [1.0f32; 4];
    let mut out = [0.0f32; 4];
    let status = unsafe { vconv_convolve_by_index(42, data.as_ptr(), out.as_mut_ptr(), 4, data.as_ptr(), 1) };
    assert_eq!(status, VCONV_ERROR_INVALID_ARGUMENT);
    assert!(last_error().contains("index 42"));
}

#[test]
fn errors_are_per_thread() {
    let data = [1.0f32; 4];
    let mut out = [0.0f32; 4];
    let status = unsafe { vconv_convolve_naive(data.as_ptr(), out.as_mut_ptr(), 4, data.as_ptr(), 0) };
    assert_eq!(status, VCONV_ERROR_INVALID_ARGUMENT);
    let other = std::thread::spawn(|| vconv_last_error().is_null()).join().unwrap();
    assert!(other);
    assert!(!vconv_last_error().is_null());
}
