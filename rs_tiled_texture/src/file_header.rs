use crate::error::Result;
use crate::EEndianType;
use serde::de::DeserializeOwned;

type HeaderLengthDataType = u64;

pub const IDENTIFICATION_OFFSET: usize = 0;
pub const IDENTIFICATION_SIZE: usize = 4;
pub const HEADER_LENGTH_OFFSET: usize = IDENTIFICATION_OFFSET + IDENTIFICATION_SIZE;
pub const HEADER_LENGTH_SIZE: usize = std::mem::size_of::<HeaderLengthDataType>();
pub const HEADER_OFFSET: usize = HEADER_LENGTH_OFFSET + HEADER_LENGTH_SIZE;

pub const TILED_TEXTURE_FILE_MAGIC_NUMBERS: &[u8; IDENTIFICATION_SIZE] = &[b'v', b'p', b't', b'x'];

pub fn serialize<T>(val: &T, endian_type: Option<EEndianType>) -> Result<Vec<u8>>
where
    T: serde::ser::Serialize,
{
    let endian_type = endian_type.unwrap_or_default();
    match endian_type {
        EEndianType::Big => {
            bincode::serde::encode_to_vec(val, bincode::config::standard().with_big_endian())
        }
        EEndianType::Little => {
            bincode::serde::encode_to_vec(val, bincode::config::standard().with_little_endian())
        }
        EEndianType::Native => bincode::serde::encode_to_vec(val, bincode::config::standard()),
    }
    .map_err(|err| {
        let msg = format!("Fail to serialize.");
        crate::error::Error::EncodeError(err, Some(msg))
    })
}

pub fn deserialize<D: DeserializeOwned>(src: &[u8], endian_type: Option<EEndianType>) -> Result<D> {
    let endian_type = endian_type.unwrap_or_default();
    let result: std::result::Result<(D, usize), bincode::error::DecodeError> = match endian_type {
        EEndianType::Big => {
            bincode::serde::decode_from_slice(src, bincode::config::standard().with_big_endian())
        }
        EEndianType::Little => {
            bincode::serde::decode_from_slice(src, bincode::config::standard().with_little_endian())
        }
        EEndianType::Native => bincode::serde::decode_from_slice(src, bincode::config::standard()),
    };
    match result {
        Ok((object, _)) => Ok(object),
        Err(err) => {
            let msg = format!("Fail to deserialize.");
            Err(crate::error::Error::DecodeError(err, Some(msg)))
        }
    }
}

pub struct FileHeader {}

impl FileHeader {
    /// Magic numbers, u64 header length, then the bincode encoded header.
    pub fn write_header<T>(
        magic_numbers: &[u8; IDENTIFICATION_SIZE],
        header: &T,
        endian_type: Option<EEndianType>,
    ) -> Result<Vec<u8>>
    where
        T: serde::ser::Serialize,
    {
        let endian_type = endian_type.unwrap_or_default();
        let mut serialize_data = serialize(header, Some(endian_type))?;
        let header_length: HeaderLengthDataType = serialize_data
            .len()
            .try_into()
            .map_err(|_| crate::error::Error::DataConvertFail)?;
        let header_length_data: [u8; HEADER_LENGTH_SIZE] = match endian_type {
            EEndianType::Big => header_length.to_be_bytes(),
            EEndianType::Little => header_length.to_le_bytes(),
            EEndianType::Native => header_length.to_ne_bytes(),
        };
        let mut data: Vec<u8> = Vec::with_capacity(HEADER_OFFSET + serialize_data.len());
        data.extend_from_slice(magic_numbers);
        data.extend_from_slice(&header_length_data);
        data.append(&mut serialize_data);
        Ok(data)
    }

    pub fn get_header<R, T>(reader: &mut R, endian_type: Option<EEndianType>) -> Result<T>
    where
        R: std::io::Seek + std::io::Read,
        T: serde::de::DeserializeOwned,
    {
        let header_length = Self::get_header_encoded_data_length(reader, endian_type)?;
        let data = Self::get_header_encoded_data(reader, header_length)?;
        deserialize(&data, endian_type)
    }

    pub fn get_header_encoded_data<R>(
        reader: &mut R,
        header_length: HeaderLengthDataType,
    ) -> Result<Vec<u8>>
    where
        R: std::io::Seek + std::io::Read,
    {
        reader
            .seek(std::io::SeekFrom::Start(HEADER_OFFSET as u64))
            .map_err(|err| {
                crate::error::Error::IO(err, Some(String::from("Failed to seek `HEADER_OFFSET`.")))
            })?;
        let mut data: Vec<u8> = vec![0; header_length as usize];
        reader.read_exact(&mut data).map_err(|err| {
            crate::error::Error::IO(
                err,
                Some(String::from("Fail to read the exact number of bytes.")),
            )
        })?;
        Ok(data)
    }

    pub fn get_header_encoded_data_length<R>(
        reader: &mut R,
        endian_type: Option<EEndianType>,
    ) -> Result<HeaderLengthDataType>
    where
        R: std::io::Seek + std::io::Read,
    {
        let endian_type = endian_type.unwrap_or_default();
        reader
            .seek(std::io::SeekFrom::Start(HEADER_LENGTH_OFFSET as u64))
            .map_err(|err| {
                crate::error::Error::IO(
                    err,
                    Some(String::from("Failed to seek `HEADER_LENGTH_OFFSET`.")),
                )
            })?;
        let mut data = [0; HEADER_LENGTH_SIZE];
        reader
            .read_exact(&mut data)
            .map_err(|err| crate::error::Error::IO(err, None))?;
        let length = match endian_type {
            EEndianType::Big => HeaderLengthDataType::from_be_bytes(data),
            EEndianType::Little => HeaderLengthDataType::from_le_bytes(data),
            EEndianType::Native => HeaderLengthDataType::from_ne_bytes(data),
        };
        Ok(length)
    }

    pub fn check_identification<R>(reader: &mut R, magic_numbers: &[u8]) -> Result<()>
    where
        R: std::io::Seek + std::io::Read,
    {
        reader
            .seek(std::io::SeekFrom::Start(IDENTIFICATION_OFFSET as u64))
            .map_err(|err| {
                crate::error::Error::IO(
                    err,
                    Some(String::from("Failed to seek `IDENTIFICATION_OFFSET`.")),
                )
            })?;
        let mut data: Vec<u8> = vec![0; magic_numbers.len()];
        reader.read_exact(&mut data).map_err(|err| {
            crate::error::Error::IO(
                err,
                Some(String::from("Failed to read `IDENTIFICATION` data.")),
            )
        })?;
        if data == magic_numbers {
            Ok(())
        } else {
            Err(crate::error::Error::CheckIdentificationFail)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestHeader {
        width: u32,
        height: u32,
        pages_count: u32,
    }

    #[test]
    fn test_case() {
        let header = TestHeader {
            width: 512,
            height: 256,
            pages_count: 11,
        };
        let data = FileHeader::write_header(
            TILED_TEXTURE_FILE_MAGIC_NUMBERS,
            &header,
            Some(EEndianType::Little),
        )
        .unwrap();
        let mut reader = std::io::Cursor::new(data);
        FileHeader::check_identification(&mut reader, TILED_TEXTURE_FILE_MAGIC_NUMBERS).unwrap();
        let decoded: TestHeader =
            FileHeader::get_header(&mut reader, Some(EEndianType::Little)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_case_1() {
        let header = TestHeader {
            width: 1,
            height: 1,
            pages_count: 0,
        };
        let mut data = FileHeader::write_header(
            TILED_TEXTURE_FILE_MAGIC_NUMBERS,
            &header,
            Some(EEndianType::Little),
        )
        .unwrap();
        data[0] = b'x';
        let mut reader = std::io::Cursor::new(data);
        assert!(
            FileHeader::check_identification(&mut reader, TILED_TEXTURE_FILE_MAGIC_NUMBERS)
                .is_err()
        );
    }
}
