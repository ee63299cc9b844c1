use crate::error::Result;

/// Byte shuffle preconditioner. Groups the n-th byte of every element
/// together so the block compressor sees long runs of high bytes, the same
/// transform the original asset pipeline applied before compression. The
/// shuffle width is the destination format's per channel byte size.
pub fn shuffle(data: &[u8], type_size: usize) -> Vec<u8> {
    if type_size <= 1 || data.len() % type_size != 0 {
        return data.to_vec();
    }
    let element_count = data.len() / type_size;
    let mut out = vec![0_u8; data.len()];
    for element in 0..element_count {
        for byte in 0..type_size {
            out[byte * element_count + element] = data[element * type_size + byte];
        }
    }
    out
}

pub fn unshuffle(data: &[u8], type_size: usize) -> Vec<u8> {
    if type_size <= 1 || data.len() % type_size != 0 {
        return data.to_vec();
    }
    let element_count = data.len() / type_size;
    let mut out = vec![0_u8; data.len()];
    for element in 0..element_count {
        for byte in 0..type_size {
            out[element * type_size + byte] = data[byte * element_count + element];
        }
    }
    out
}

pub fn compress_page(page_data: &[u8], type_size: usize, level: i32) -> Result<Vec<u8>> {
    let shuffled = shuffle(page_data, type_size);
    zstd::bulk::compress(&shuffled, level)
        .map_err(|err| crate::error::Error::Compression(err, Some(format!("Fail to compress."))))
}

pub fn decompress_page(compressed: &[u8], type_size: usize) -> Result<Vec<u8>> {
    let shuffled = zstd::bulk::decompress(compressed, crate::PAGE_BYTE_COUNT)
        .map_err(|err| crate::error::Error::Compression(err, Some(format!("Fail to decompress."))))?;
    if shuffled.len() != crate::PAGE_BYTE_COUNT {
        return Err(crate::error::Error::DataConvertFail);
    }
    Ok(unshuffle(&shuffled, type_size))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shuffle_round_trip() {
        for type_size in [1_usize, 2, 4, 8] {
            let data: Vec<u8> = (0..256).map(|value| value as u8).collect();
            let shuffled = shuffle(&data, type_size);
            assert_eq!(unshuffle(&shuffled, type_size), data);
        }
    }

    #[test]
    fn shuffle_groups_bytes() {
        let data = [1_u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(shuffle(&data, 4), vec![1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn compress_round_trip() {
        let mut page_data = vec![0_u8; crate::PAGE_BYTE_COUNT];
        for (index, value) in page_data.iter_mut().enumerate() {
            *value = (index % 251) as u8;
        }
        let compressed = compress_page(&page_data, 4, 3).unwrap();
        assert!(compressed.len() < page_data.len());
        let decompressed = decompress_page(&compressed, 4).unwrap();
        assert_eq!(decompressed, page_data);
    }
}
