//! On-disk artifact format for [`Graph`]: a little-endian binary framing with
//! magic and version, consumable by any process implementing the same read
//! contract.

use std::{
    io,
    path::Path,
};

use byteorder::{
    ByteOrder,
    LittleEndian,
};
use futures_lite::io::{
    AsyncRead,
    AsyncReadExt,
    AsyncWrite,
    AsyncWriteExt,
};
use int_enum::IntEnum;
use tokio_util::compat::{
    TokioAsyncReadCompatExt,
    TokioAsyncWriteCompatExt,
};

use super::{
    Graph,
    GraphError,
    Op,
};

pub const MAGIC: [u8; 4] = *b"PGF\0";
pub const VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("io error")]
    Io(#[from] io::Error),

    #[error("invalid magic: {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("incompatible version: {found}")]
    IncompatibleVersion { found: u32 },

    #[error("invalid element type: {found}")]
    InvalidElementType { found: u32 },

    #[error("invalid opcode: {found}")]
    InvalidOpCode { found: u32 },

    #[error("malformed graph")]
    Graph(#[from] GraphError),
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
pub enum ElementType {
    F32 = 0,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
pub enum OpCode {
    Add = 1,
}

macro_rules! byteorder_read {
    ($method:ident, $ty:ident, $num_bytes:expr) => {
        async fn $method<T: ByteOrder>(&mut self) -> Result<$ty, io::Error> {
            let mut buf = [0; $num_bytes];
            self.read_exact(&mut buf).await?;
            Ok(T::$method(&buf))
        }
    };
}

macro_rules! byteorder_write {
    ($method:ident, $ty:ident, $num_bytes:expr) => {
        async fn $method<T: ByteOrder>(&mut self, value: $ty) -> Result<(), io::Error> {
            let mut buf = [0; $num_bytes];
            T::$method(&mut buf, value);
            self.write_all(&buf).await
        }
    };
}

trait ReadBytesAsyncExt: AsyncReadExt + Unpin {
    byteorder_read!(read_u32, u32, 4);
}

impl<T: AsyncReadExt + Unpin> ReadBytesAsyncExt for T {}

trait WriteBytesAsyncExt: AsyncWriteExt + Unpin {
    byteorder_write!(write_u32, u32, 4);
}

impl<T: AsyncWriteExt + Unpin> WriteBytesAsyncExt for T {}

impl Graph {
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, mut writer: W) -> Result<(), FileError> {
        writer.write_all(&MAGIC).await?;
        writer.write_u32::<LittleEndian>(VERSION).await?;
        writer
            .write_u32::<LittleEndian>(u32::from(ElementType::F32))
            .await?;
        writer.write_u32::<LittleEndian>(self.num_inputs).await?;
        writer.write_u32::<LittleEndian>(self.num_values).await?;
        writer.write_u32::<LittleEndian>(self.output).await?;
        writer
            .write_u32::<LittleEndian>(self.ops.len() as u32)
            .await?;

        for op in &self.ops {
            match *op {
                Op::Add { lhs, rhs, out } => {
                    writer
                        .write_u32::<LittleEndian>(u32::from(OpCode::Add))
                        .await?;
                    writer.write_u32::<LittleEndian>(lhs).await?;
                    writer.write_u32::<LittleEndian>(rhs).await?;
                    writer.write_u32::<LittleEndian>(out).await?;
                }
            }
        }

        writer.flush().await?;
        Ok(())
    }

    pub async fn read_from<R: AsyncRead + Unpin>(mut reader: R) -> Result<Self, FileError> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic).await?;
        if magic != MAGIC {
            return Err(FileError::InvalidMagic { found: magic });
        }

        let version = reader.read_u32::<LittleEndian>().await?;
        if version != VERSION {
            return Err(FileError::IncompatibleVersion { found: version });
        }

        let element_type = reader.read_u32::<LittleEndian>().await?;
        ElementType::try_from(element_type)
            .map_err(|_| FileError::InvalidElementType {
                found: element_type,
            })?;

        let num_inputs = reader.read_u32::<LittleEndian>().await?;
        let num_values = reader.read_u32::<LittleEndian>().await?;
        let output = reader.read_u32::<LittleEndian>().await?;
        let num_ops = reader.read_u32::<LittleEndian>().await?;

        let mut ops = Vec::with_capacity(num_ops as usize);
        for _ in 0..num_ops {
            let opcode = reader.read_u32::<LittleEndian>().await?;
            let opcode =
                OpCode::try_from(opcode).map_err(|_| FileError::InvalidOpCode { found: opcode })?;

            match opcode {
                OpCode::Add => {
                    let lhs = reader.read_u32::<LittleEndian>().await?;
                    let rhs = reader.read_u32::<LittleEndian>().await?;
                    let out = reader.read_u32::<LittleEndian>().await?;
                    ops.push(Op::Add { lhs, rhs, out });
                }
            }
        }

        let graph = Graph {
            num_inputs,
            num_values,
            output,
            ops,
        };
        graph.validate()?;

        Ok(graph)
    }

    pub async fn save(&self, path: &Path) -> Result<(), FileError> {
        let file = tokio::fs::File::create(path).await?;
        let mut writer = file.compat_write();
        self.write_to(&mut writer).await?;
        Ok(())
    }

    pub async fn open(path: &Path) -> Result<Self, FileError> {
        let reader = tokio::io::BufReader::new(tokio::fs::File::open(path).await?);
        Self::read_from(reader.compat()).await
    }
}
