//! Image reference parsing.

/// A parsed `repository[:tag]` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Split an image reference into repository and tag.
    ///
    /// The tag separator is the last `:` after the last `/`, so registry
    /// references with a port (`host:5000/repo:tag`) parse correctly. With
    /// no tag the reference defaults to `latest`.
    pub fn parse(image: &str) -> ImageRef {
        let slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
        match image[slash..].rfind(':') {
            Some(colon) => {
                let tag = &image[slash + colon + 1..];
                ImageRef {
                    repository: image[..slash + colon].to_owned(),
                    tag: if tag.is_empty() {
                        "latest".to_owned()
                    } else {
                        tag.to_owned()
                    },
                }
            }
            None => ImageRef {
                repository: image.to_owned(),
                tag: "latest".to_owned(),
            },
        }
    }

    /// The reference string for this repository at tag `latest`.
    pub fn latest(&self) -> String {
        format!("{}:latest", self.repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_repository() {
        let r = ImageRef::parse("nginx");
        assert_eq!(r.repository, "nginx");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn parses_repository_with_tag() {
        let r = ImageRef::parse("nginx:1.25");
        assert_eq!(r.repository, "nginx");
        assert_eq!(r.tag, "1.25");
    }

    #[test]
    fn parses_registry_with_port_and_tag() {
        let r = ImageRef::parse("registry.local:5000/team/app:v2");
        assert_eq!(r.repository, "registry.local:5000/team/app");
        assert_eq!(r.tag, "v2");
    }

    #[test]
    fn registry_port_without_tag_defaults_to_latest() {
        let r = ImageRef::parse("registry.local:5000/team/app");
        assert_eq!(r.repository, "registry.local:5000/team/app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn trailing_colon_defaults_to_latest() {
        let r = ImageRef::parse("nginx:");
        assert_eq!(r.repository, "nginx");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn latest_reference() {
        assert_eq!(ImageRef::parse("nginx:1.25").latest(), "nginx:latest");
    }
}
