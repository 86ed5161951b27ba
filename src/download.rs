use std::{
    fs::{create_dir_all, File},
    io::Write,
    path::PathBuf,
};

use burn::data::network::downloader;

use crate::error::{VrcNetError, VrcNetResult};

/// Download the pre-trained weights to the local cache directory.
pub(crate) fn download(url: &str) -> VrcNetResult<PathBuf> {
    let io_err = |source: std::io::Error| VrcNetError::Download {
        url: url.to_owned(),
        source,
    };

    // Model cache directory
    let model_dir = dirs::home_dir()
        .ok_or_else(|| {
            io_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not locate the home directory.",
            ))
        })?
        .join(".cache")
        .join("vrcnet-burn");

    if !model_dir.exists() {
        create_dir_all(&model_dir).map_err(io_err)?;
    }

    let file_base_name = url.rsplit_once('/').map_or(url, |(_, name)| name);
    let file_name = model_dir.join(file_base_name);
    if file_name.exists() {
        tracing::debug!(path = %file_name.display(), "using cached weights");
        return Ok(file_name);
    }

    tracing::info!(%url, "downloading pretrained weights");
    let bytes = downloader::download_file_as_bytes(url, file_base_name);

    let mut output_file = File::create(&file_name).map_err(io_err)?;
    let bytes_written = output_file.write(&bytes).map_err(io_err)?;

    if bytes_written != bytes.len() {
        return Err(io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Failed to write the whole model weights file.",
        )));
    }

    Ok(file_name)
}
