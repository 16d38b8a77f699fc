use rand::Rng;

/// Generate `len` random bytes, hex encoded (2 * len characters)
pub fn generate_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hex() {
        let value = generate_hex(16);
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(value, generate_hex(16));
    }
}
