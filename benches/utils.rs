#![allow(dead_code)]

use rand::Rng;

/// 内存吞吐量 GiB/s
pub fn throughput_gibs(bytes: usize, duration_secs: f64) -> f64 {
    bytes as f64 / duration_secs / (1024.0 * 1024.0 * 1024.0)
}

/// 二元 elementwise 算子的读写字节数 (x + y + out)
pub fn binary_rw_bytes(n: usize, elem_size: usize) -> u64 {
    3 * n as u64 * elem_size as u64
}

/// 生成随机 f32 向量 [-1.0, 1.0)
pub fn random_f32_vec(n: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}
