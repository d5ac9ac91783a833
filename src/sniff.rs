//! File type detection from magic bytes.

/// Bytes needed to recognise every supported signature.
pub const SNIFF_LEN: usize = 262;

/// Guess a file extension from the first bytes of a file.
pub fn infer_extension(head: &[u8]) -> Option<&'static str> {
    if head.len() < 4 {
        return None;
    }

    // ISO base media (mp4 family, HEIF, AVIF)
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(ftyp_extension(&head[8..12]));
    }

    // Images
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if head.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if head.starts_with(b"BM") && head.len() >= 14 {
        return Some("bmp");
    }
    if head.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || head.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("tif");
    }
    if head.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some("ico");
    }

    // RIFF containers: WebP, WAV, AVI
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        match &head[8..12] {
            b"WEBP" => return Some("webp"),
            b"WAVE" => return Some("wav"),
            b"AVI " => return Some("avi"),
            _ => {}
        }
    }

    // Matroska / WebM
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(if contains(head, b"webm") { "webm" } else { "mkv" });
    }

    // Audio
    if head.starts_with(b"fLaC") {
        return Some("flac");
    }
    if head.starts_with(b"OggS") {
        return Some("ogg");
    }
    if head.starts_with(b"ID3") || (head[0] == 0xFF && head[1] & 0xE0 == 0xE0 && head[1] & 0x06 != 0)
    {
        return Some("mp3");
    }

    // Documents and archives
    if head.starts_with(b"%PDF") {
        return Some("pdf");
    }
    if head.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Some("zip");
    }
    if head.starts_with(b"Rar!\x1A\x07") {
        return Some("rar");
    }
    if head.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some("7z");
    }
    if head.starts_with(&[0x1F, 0x8B, 0x08]) {
        return Some("gz");
    }

    None
}

fn ftyp_extension(brand: &[u8]) -> &'static str {
    match brand {
        b"heic" | b"heix" | b"mif1" | b"msf1" => "heic",
        b"avif" | b"avis" => "avif",
        b"qt  " => "mov",
        b"M4A " | b"M4B " => "m4a",
        b"M4V " | b"M4VH" | b"M4VP" => "m4v",
        b"3gp4" | b"3gp5" | b"3gp6" | b"3g2a" => "3gp",
        _ => "mp4",
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Extension registered for a MIME type, if any.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.split(';').next().unwrap_or(mime).trim();
    match mime {
        // mime_guess lists "jpe" first for image/jpeg
        "image/jpeg" => Some("jpg"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "audio/mpeg" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        _ => mime_guess::get_mime_extensions_str(mime).and_then(|exts| exts.first().copied()),
    }
}
