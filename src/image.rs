use crate::error::ImageError;

/// Origin used when a program does not declare one.
pub const DEFAULT_ORIG: u16 = 0x3000;

/// Largest number of words that fit in memory.
pub const MAX_WORDS: usize = 1 << 16;

/// A program image: a load address and the words placed from it onwards.
///
/// Stored on disk as big-endian words, origin first, with no header.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    orig: u16,
    words: Vec<u16>,
}

impl Image {
    pub fn new(orig: u16, words: Vec<u16>) -> Self {
        Image { orig, words }
    }

    pub fn orig(&self) -> u16 {
        self.orig
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Words of the program, not counting the origin.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// `(address, word)` for every program word. Addresses wrap at the end of memory.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.words
            .iter()
            .enumerate()
            .map(|(i, &word)| (self.orig.wrapping_add(i as u16), word))
    }

    /// Origin followed by the program words.
    pub fn to_words(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.words.len() + 1);
        out.push(self.orig);
        out.extend_from_slice(&self.words);
        out
    }

    pub fn from_words(raw: &[u16]) -> Result<Self, ImageError> {
        let (&orig, words) = raw.split_first().ok_or(ImageError::Empty)?;
        if words.len() > MAX_WORDS {
            return Err(ImageError::TooLarge { words: words.len() });
        }
        Ok(Image::new(orig, words.to_vec()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .into_iter()
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() % 2 != 0 {
            return Err(ImageError::Misaligned { len: bytes.len() });
        }
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
            .collect();
        Image::from_words(&words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_layout() {
        let image = Image::new(0x3000, vec![0xF025, 0x0048]);
        assert_eq!(
            image.to_bytes(),
            [0x30, 0x00, 0xF0, 0x25, 0x00, 0x48]
        );
        assert_eq!(Image::from_bytes(&image.to_bytes()), Ok(image));
    }

    #[test]
    fn origin_only() {
        let image = Image::from_bytes(&[0x40, 0x00]).unwrap();
        assert_eq!(image.orig(), 0x4000);
        assert!(image.is_empty());
    }

    #[test]
    fn bad_images() {
        assert_eq!(Image::from_bytes(&[]), Err(ImageError::Empty));
        assert_eq!(
            Image::from_bytes(&[0x30, 0x00, 0x12]),
            Err(ImageError::Misaligned { len: 3 })
        );
        let huge = vec![0u16; MAX_WORDS + 2];
        assert_eq!(
            Image::from_words(&huge),
            Err(ImageError::TooLarge { words: MAX_WORDS + 1 })
        );
    }

    #[test]
    fn addresses_wrap() {
        let image = Image::new(0xFFFF, vec![1, 2]);
        let addrs: Vec<_> = image.iter().map(|(addr, _)| addr).collect();
        assert_eq!(addrs, [0xFFFF, 0x0000]);
    }
}
