use half::{bf16, f16};

/// Vector add: `out[i] = a[i] + b[i]`
#[no_mangle]
#[inline(never)]
pub extern "C" fn scalar_vec_add(a: *const f32, b: *const f32, out: *mut f32, n: usize) {
    for i in 0..n {
        unsafe {
            *out.add(i) = *a.add(i) + *b.add(i);
        }
    }
}

/// Vector add in half precision, rounded once from the f32 sum.
#[no_mangle]
#[inline(never)]
pub extern "C" fn scalar_vec_add_f16(a: *const f16, b: *const f16, out: *mut f16, n: usize) {
    for i in 0..n {
        unsafe {
            let sum = (*a.add(i)).to_f32() + (*b.add(i)).to_f32();
            *out.add(i) = f16::from_f32(sum);
        }
    }
}

/// Vector add in bf16: widen, add in f32, narrow round-to-nearest-even.
#[no_mangle]
#[inline(never)]
pub extern "C" fn scalar_vec_add_bf16(a: *const bf16, b: *const bf16, out: *mut bf16, n: usize) {
    for i in 0..n {
        unsafe {
            let sum = (*a.add(i)).to_f32() + (*b.add(i)).to_f32();
            *out.add(i) = bf16::from_f32(sum);
        }
    }
}

/// Narrow an f32 to bf16 with round-to-nearest-even on the raw bits.
///
/// Independent of `half`'s conversion so tests can cross-check it.
pub fn f32_to_bf16_rne(v: f32) -> bf16 {
    if v.is_nan() {
        return bf16::NAN;
    }
    let bits = v.to_bits();
    let lsb = (bits >> 16) & 1;
    let rounded = bits.wrapping_add(0x7fff + lsb);
    bf16::from_bits((rounded >> 16) as u16)
}

/// Safe wrapper over [`scalar_vec_add`].
pub fn vec_add_f32(a: &[f32], b: &[f32]) -> Vec<f32> {
    assert_eq!(a.len(), b.len());
    let mut out = vec![0.0f32; a.len()];
    scalar_vec_add(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), a.len());
    out
}

/// Safe wrapper over [`scalar_vec_add_f16`].
pub fn vec_add_f16(a: &[f16], b: &[f16]) -> Vec<f16> {
    assert_eq!(a.len(), b.len());
    let mut out = vec![f16::ZERO; a.len()];
    scalar_vec_add_f16(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), a.len());
    out
}

/// Safe wrapper over [`scalar_vec_add_bf16`].
pub fn vec_add_bf16(a: &[bf16], b: &[bf16]) -> Vec<bf16> {
    assert_eq!(a.len(), b.len());
    let mut out = vec![bf16::ZERO; a.len()];
    scalar_vec_add_bf16(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), a.len());
    out
}
