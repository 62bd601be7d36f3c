//! Per-name substitution ciphers and digit decoders

/// Characters of a Cyberworks base-40 number, lowest digit value first
pub const BASE40_ALPHABET: &[u8; 40] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_-.!";

/// Number of letters in the CatSystem2 name alphabet
const NAME_ALPHABET_LEN: i32 = 52;

/// Index of an ASCII letter in the reversed alphabet `z..a Z..A`
fn reversed_letter_index(c: u8) -> Option<i32> {
    if c.is_ascii_lowercase() {
        Some(i32::from(b'z' - c))
    } else if c.is_ascii_uppercase() {
        Some(i32::from(b'Z' - c) + 26)
    } else {
        None
    }
}

fn reversed_letter(j: i32) -> u8 {
    if j < 26 {
        b'z' - j as u8
    } else {
        b'Z' - (j - 26) as u8
    }
}

/// Decipher a CatSystem2 INT entry name in place
///
/// Stops at the first NUL and returns the deciphered prefix. Only ASCII
/// letters are substituted, but every byte advances the key.
///
/// ```
/// use vnarc_crypto::substitution::catsystem_decipher_name;
///
/// let mut name = *b"abc\0";
/// assert_eq!(catsystem_decipher_name(&mut name, 0), b"ZXV");
/// ```
pub fn catsystem_decipher_name(name: &mut [u8], key: u32) -> &[u8] {
    let mut k = (key >> 24)
        .wrapping_add(key >> 16)
        .wrapping_add(key >> 8)
        .wrapping_add(key)
        & 0xFF;

    let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    for c in &mut name[..len] {
        if let Some(j) = reversed_letter_index(*c) {
            let j = (j - (k % 52) as i32).rem_euclid(NAME_ALPHABET_LEN);
            *c = reversed_letter(NAME_ALPHABET_LEN - 1 - j);
        }
        k += 1;
    }
    &name[..len]
}

/// Decode big-endian base-40 digits
///
/// Returns `None` for characters outside [`BASE40_ALPHABET`] or on overflow.
pub fn decode_base40(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &c| {
        let digit = BASE40_ALPHABET.iter().position(|&a| a == c)?;
        acc.checked_mul(40)?.checked_add(digit as u32)
    })
}

/// Decipher a Silky's Azurite archive name in place
///
/// Byte `i` of an `n`-byte name was stored minus `n - i`.
pub fn azurite_decipher_name(name: &mut [u8]) {
    let len = name.len();
    for (i, c) in name.iter_mut().enumerate() {
        *c = c.wrapping_add((len - i) as u8);
    }
}
