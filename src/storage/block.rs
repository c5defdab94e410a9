use super::error::DeviceError;

/// Block-number addressed view of a device, for filesystems built on top.
pub trait BlockDevice {
    fn block_size(&self) -> usize {
        ddriver_core::DEFAULT_BLOCK_SIZE
    }

    fn block_count(&self) -> u64;

    fn read_block(&mut self, lba: u64, out: &mut [u8]) -> Result<(), DeviceError>;

    fn write_block(&mut self, lba: u64, data: &[u8]) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::{BlockDevice, DeviceError};

    struct MockBlock {
        blocks: Vec<[u8; 512]>,
    }

    impl MockBlock {
        fn new(count: usize) -> Self {
            Self {
                blocks: vec![[0_u8; 512]; count],
            }
        }
    }

    impl BlockDevice for MockBlock {
        fn block_count(&self) -> u64 {
            self.blocks.len() as u64
        }

        fn read_block(&mut self, lba: u64, out: &mut [u8]) -> Result<(), DeviceError> {
            if out.len() != self.block_size() {
                return Err(DeviceError::InvalidTransferSize {
                    size: out.len(),
                    block_size: self.block_size(),
                });
            }
            let block = self.blocks.get(lba as usize).ok_or(DeviceError::EndOfDevice {
                position: lba * 512,
                capacity: self.block_count() * 512,
            })?;
            out.copy_from_slice(block);
            Ok(())
        }

        fn write_block(&mut self, lba: u64, data: &[u8]) -> Result<(), DeviceError> {
            if data.len() != self.block_size() {
                return Err(DeviceError::InvalidTransferSize {
                    size: data.len(),
                    block_size: self.block_size(),
                });
            }
            let capacity = self.block_count() * 512;
            let block = self
                .blocks
                .get_mut(lba as usize)
                .ok_or(DeviceError::EndOfDevice {
                    position: lba * 512,
                    capacity,
                })?;
            block.copy_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn default_block_size_is_512() {
        assert_eq!(MockBlock::new(1).block_size(), 512);
    }

    #[test]
    fn writes_then_reads_a_block() {
        let mut dev = MockBlock::new(4);
        dev.write_block(2, &[0x5A; 512]).expect("write");
        let mut buf = [0_u8; 512];
        dev.read_block(2, &mut buf).expect("read");
        assert!(buf.iter().all(|b| *b == 0x5A));
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let mut dev = MockBlock::new(1);
        let mut buf = [0_u8; 128];
        assert!(matches!(
            dev.read_block(0, &mut buf),
            Err(DeviceError::InvalidTransferSize { size: 128, .. })
        ));
    }
}
