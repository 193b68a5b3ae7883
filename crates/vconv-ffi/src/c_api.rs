//! Exported C functions and status codes

use std::cell::RefCell;
use std::ffi::{CString, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::OnceLock;

use vconv_common::{KernelError, VconvError};
use vconv_kernels::{Variant, global_manager, runtime_simd_level};

/// Status codes
pub const VCONV_SUCCESS: c_int = 0;
pub const VCONV_ERROR_INVALID_ARGUMENT: c_int = -1;
pub const VCONV_ERROR_LENGTH_MISMATCH: c_int = -2;
pub const VCONV_ERROR_UNSUPPORTED_HARDWARE: c_int = -3;
pub const VCONV_ERROR_NULL_POINTER: c_int = -4;
pub const VCONV_ERROR_INTERNAL: c_int = -10;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

static VARIANT_NAMES: OnceLock<Vec<CString>> = OnceLock::new();

/// NUL-terminated names of [`EXPORTED_VARIANTS`], in the same order.
fn variant_names() -> &'static [CString] {
    VARIANT_NAMES.get_or_init(|| {
        EXPORTED_VARIANTS.iter().map(|v| CString::new(v.name()).unwrap_or_default()).collect()
    })
}

fn set_last_error(message: &str) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Status code for a library error.
pub fn error_code(error: &VconvError) -> c_int {
    match error {
        VconvError::Kernel(KernelError::InvalidArgument { .. } | KernelError::UnknownVariant { .. }) => {
            VCONV_ERROR_INVALID_ARGUMENT
        }
        VconvError::Kernel(KernelError::LengthMismatch { .. }) => VCONV_ERROR_LENGTH_MISMATCH,
        VconvError::Kernel(KernelError::UnsupportedHardware { .. }) => VCONV_ERROR_UNSUPPORTED_HARDWARE,
        VconvError::Kernel(KernelError::NoProvider) | VconvError::Config(_) => VCONV_ERROR_INTERNAL,
    }
}

fn fail(code: c_int, message: &str) -> c_int {
    log::debug!("vconv C API call failed ({code}): {message}");
    set_last_error(message);
    code
}

fn variant_at(index: c_int) -> Option<Variant> {
    usize::try_from(index).ok().and_then(|i| EXPORTED_VARIANTS.get(i).copied())
}

/// Shared body of every exported convolution function. `None` selects the
/// variant through the process-wide `KernelManager` (see `global_manager`).
///
/// # Safety
///
/// Non-null pointers must be valid for the lengths implied by `length` and
/// `kernel_length`, and `output` must not overlap `input` or `kernel`.
unsafe fn convolve_raw(
    variant: Option<Variant>,
    input: *const f32,
    output: *mut f32,
    length: c_int,
    kernel: *const f32,
    kernel_length: c_int,
) -> c_int {
    clear_last_error();

    if input.is_null() || output.is_null() || kernel.is_null() {
        return fail(VCONV_ERROR_NULL_POINTER, "input, output and kernel must be non-null");
    }
    let (Ok(n), Ok(k)) = (usize::try_from(length), usize::try_from(kernel_length)) else {
        return fail(VCONV_ERROR_INVALID_ARGUMENT, "lengths must be non-negative");
    };
    if k == 0 {
        return fail(VCONV_ERROR_INVALID_ARGUMENT, "kernel must contain at least one tap");
    }
    if k > n {
        return fail(
            VCONV_ERROR_INVALID_ARGUMENT,
            &format!("kernel length {k} exceeds input length {n}"),
        );
    }

    let result = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: pointers are non-null and the caller guarantees they cover
        // `n`, `k` and `n - k + 1` floats respectively.
        let input = unsafe { std::slice::from_raw_parts(input, n) };
        let kernel = unsafe { std::slice::from_raw_parts(kernel, k) };
        let output = unsafe { std::slice::from_raw_parts_mut(output, n - k + 1) };
        match variant {
            Some(variant) => variant.convolve(input, kernel, output),
            None => global_manager().convolve(input, kernel, output),
        }
    }));

    match result {
        Ok(Ok(())) => VCONV_SUCCESS,
        Ok(Err(error)) => fail(error_code(&error), &error.to_string()),
        Err(_) => fail(VCONV_ERROR_INTERNAL, "panic inside convolution kernel"),
    }
}

macro_rules! export_variants {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        /// Variants in export order; `vconv_convolve_by_index` and
        /// `vconv_variant_name` index into this.
        const EXPORTED_VARIANTS: &[Variant] = &[$(Variant::$variant),*];

        $(
            #[doc = concat!("C entry point `", stringify!($fn_name), "`.")]
            ///
            /// Writes `length - kernel_length + 1` floats to `output` and returns
            /// a status code.
            ///
            /// # Safety
            ///
            /// `input`, `kernel` and `output` must be null or valid for `length`,
            /// `kernel_length` and `length - kernel_length + 1` floats, and
            /// `output` must not overlap the other two.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $fn_name(
                input: *const f32,
                output: *mut f32,
                length: c_int,
                kernel: *const f32,
                kernel_length: c_int,
            ) -> c_int {
                unsafe { convolve_raw(Some(Variant::$variant), input, output, length, kernel, kernel_length) }
            }
        )*
    };
}

export_variants! {
    vconv_convolve_naive => Naive,
    vconv_convolve_reversed_naive => ReversedNaive,
    vconv_convolve_sse_simple => SseSimple,
    vconv_convolve_sse_partial_unroll => SsePartialUnroll,
    vconv_convolve_sse_in_aligned => SseInAligned,
    vconv_convolve_sse_in_aligned_fixed_kernel => SseInAlignedFixedKernel,
    vconv_convolve_sse_unrolled_avx_vector => SseUnrolledAvxVector,
    vconv_convolve_sse_unrolled_vector => SseUnrolledVector,
    vconv_convolve_avx_unrolled_vector => AvxUnrolledVector,
    vconv_convolve_avx_unrolled_vector_unaligned => AvxUnrolledVectorUnaligned,
    vconv_convolve_avx_unrolled_vector_unaligned_fma => AvxUnrolledVectorUnalignedFma,
    vconv_convolve_avx_unrolled_vector_m128_load => AvxUnrolledVectorM128Load,
    vconv_convolve_avx_unrolled_vector_aligned => AvxUnrolledVectorAligned,
    vconv_convolve_avx_unrolled_vector_partial_aligned => AvxUnrolledVectorPartialAligned,
    vconv_convolve_avx_unrolled_vector_local_output => AvxUnrolledVectorLocalOutput,
}

/// Convolve with the variant the dispatch table picks for this CPU.
///
/// # Safety
///
/// Same contract as the per-variant functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vconv_convolve_auto(
    input: *const f32,
    output: *mut f32,
    length: c_int,
    kernel: *const f32,
    kernel_length: c_int,
) -> c_int {
    unsafe { convolve_raw(None, input, output, length, kernel, kernel_length) }
}

/// Convolve with the variant at `index` (see [`vconv_variant_name`]).
///
/// # Safety
///
/// Same contract as the per-variant functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vconv_convolve_by_index(
    index: c_int,
    input: *const f32,
    output: *mut f32,
    length: c_int,
    kernel: *const f32,
    kernel_length: c_int,
) -> c_int {
    match variant_at(index) {
        Some(variant) => unsafe { convolve_raw(Some(variant), input, output, length, kernel, kernel_length) },
        None => fail(VCONV_ERROR_INVALID_ARGUMENT, &format!("no variant at index {index}")),
    }
}

/// Number of exported variants.
#[unsafe(no_mangle)]
pub extern "C" fn vconv_variant_count() -> c_int {
    EXPORTED_VARIANTS.len() as c_int
}

/// Name of the variant at `index`, or null when out of range. The string is static.
#[unsafe(no_mangle)]
pub extern "C" fn vconv_variant_name(index: c_int) -> *const c_char {
    match usize::try_from(index).ok().and_then(|i| variant_names().get(i)) {
        Some(name) => name.as_ptr(),
        None => {
            set_last_error(&format!("no variant at index {index}"));
            ptr::null()
        }
    }
}

/// 1 if the variant at `index` can run on this CPU, 0 if not, or
/// `VCONV_ERROR_INVALID_ARGUMENT` for an unknown index.
#[unsafe(no_mangle)]
pub extern "C" fn vconv_variant_supported(index: c_int) -> c_int {
    match variant_at(index) {
        Some(variant) => c_int::from(variant.is_supported_on(runtime_simd_level())),
        None => fail(VCONV_ERROR_INVALID_ARGUMENT, &format!("no variant at index {index}")),
    }
}

/// Message for the last failure on the calling thread, or null.
///
/// The pointer stays valid until the next vconv call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn vconv_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |message| message.as_ptr()))
}
