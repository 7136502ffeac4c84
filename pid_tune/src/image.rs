use std::{fs::File, io::Write as _, path::Path};

use anyhow::Context as _;
use pid_quantizer::{PidBlock, quantize};
use tracing::info;
use utilities::hex_record::write_hex_records;

use crate::{config::TuneConfig, models::Axis};

/// EEPROM payload: the sentinel word, one PID block per axis and the
/// trailing scalar parameters, in storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterImage {
    words: Vec<u16>,
}

impl ParameterImage {
    pub fn new(magic: u16) -> Self {
        Self { words: vec![magic] }
    }

    pub fn push_pid(&mut self, block: &PidBlock) {
        self.words.extend_from_slice(&block.to_words());
    }

    pub fn push_word(&mut self, word: u16) {
        self.words.push(word);
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn byte_len(&self) -> usize {
        self.words.len() * 2
    }
}

pub fn build_image(config: &TuneConfig) -> anyhow::Result<ParameterImage> {
    let mut image = ParameterImage::new(config.magic);

    for axis in Axis::ALL {
        let gains = config.gains(axis);
        info!(
            "Generate PID factors for {}: Kp {}, Ki {}, Kd {}",
            axis, gains.kp, gains.ki, gains.kd
        );

        let block =
            quantize(gains).with_context(|| format!("Failed to quantize {} gains", axis))?;
        info!(
            "{}: kp={} ki={} kd={} divisor={}",
            axis, block.kp, block.ki, block.kd, block.divisor
        );

        image.push_pid(&block);
    }

    image.push_word(config.esc_divider);

    Ok(image)
}

/// Writes the image as hex records to `path`, replacing any existing file.
/// Returns the number of data records written.
pub fn write_image(path: &Path, image: &ParameterImage) -> anyhow::Result<usize> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let records = write_hex_records(&mut file, image.words())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    file.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    Ok(records)
}
