use super::view::ImageView;

/// Source of named module images.
///
/// `None` (or an empty name) selects the primary image. The provider only
/// hands out read views; it never loads or unloads anything. An unknown
/// name is a normal "not found" outcome, never an error.
pub trait ImageProvider {
    fn resolve(&self, module: Option<&str>) -> Option<ImageView<'_>>;
}

impl<P: ImageProvider + ?Sized> ImageProvider for &P {
    fn resolve(&self, module: Option<&str>) -> Option<ImageView<'_>> {
        (**self).resolve(module)
    }
}

struct StaticImage {
    base: u64,
    bytes: Vec<u8>,
}

/// In-memory images keyed by name, with an explicit primary.
///
/// Used by tests and by the CLI, which treats a binary file's bytes as the
/// image to scan. Names are matched case-insensitively.
pub struct StaticImages {
    primary: Option<StaticImage>,
    named: Vec<(String, StaticImage)>,
    ptr_size: usize,
}

impl Default for StaticImages {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticImages {
    pub fn new() -> Self {
        Self {
            primary: None,
            named: Vec::new(),
            ptr_size: ImageView::NATIVE_PTR_SIZE,
        }
    }

    /// Image served for `None` or empty module names.
    pub fn primary(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.primary = Some(StaticImage { base, bytes });
        self
    }

    pub fn named(mut self, name: impl Into<String>, base: u64, bytes: Vec<u8>) -> Self {
        self.named.push((name.into(), StaticImage { base, bytes }));
        self
    }

    /// Pointer width applied to every view handed out.
    pub fn ptr_size(mut self, ptr_size: usize) -> Self {
        self.ptr_size = ptr_size;
        self
    }
}

impl ImageProvider for StaticImages {
    fn resolve(&self, module: Option<&str>) -> Option<ImageView<'_>> {
        let image = match module {
            None | Some("") => self.primary.as_ref(),
            Some(name) => self
                .named
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
                .map(|(_, image)| image),
        }?;
        Some(ImageView::new(image.base, &image.bytes).with_ptr_size(self.ptr_size))
    }
}
