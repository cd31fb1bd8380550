//! Binary size units.
use super::umem;

pub const fn kb(n: umem) -> umem {
    n << 10
}

pub const fn mb(n: umem) -> umem {
    n << 20
}

pub const fn gb(n: umem) -> umem {
    n << 30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        assert_eq!(kb(4), 0x1000);
        assert_eq!(mb(2), 0x20_0000);
        assert_eq!(gb(3), 0xc000_0000);
        assert_eq!(mb(1), kb(1024));
    }
}
