use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x6c61_6d69_6e61_7465;

/// Stable 64-bit hasher for layer generation markers and display-list fingerprints.
///
/// Unlike `std::hash`, the output does not depend on process-local random state, so markers
/// computed on different threads or in different frames compare equal for equal content.
pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        // Fold -0.0 into 0.0 so equal geometry hashes equally.
        self.write_u64((v + 0.0).to_bits());
    }

    pub(crate) fn write_rect(&mut self, r: kurbo::Rect) {
        self.write_f64(r.x0);
        self.write_f64(r.y0);
        self.write_f64(r.x1);
        self.write_f64(r.y1);
    }

    pub(crate) fn write_affine(&mut self, a: kurbo::Affine) {
        for c in a.as_coeffs() {
            self.write_f64(c);
        }
    }

    pub(crate) fn finish(self) -> u64 {
        self.inner.digest()
    }
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
