//! Running the validators over collected inputs.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow, bail};
use camino::Utf8PathBuf;
use docker_reference::{DockerImageReference, join_host_port};
use image_api::{ImageStreamImport, Object};
use image_validation::{
    ErrorList, Resolver,
    transport::{ping_registry, restricted_client},
    validation::{
        validate_image, validate_image_stream_import,
        validate_image_stream_import_allowed_registries,
        validate_image_stream_import_disallowed_hosts,
        validate_image_stream_status_update_with_whitelister,
        validate_image_stream_tag_update_with_whitelister,
        validate_image_stream_tag_with_whitelister, validate_image_stream_update_with_whitelister,
        validate_image_stream_with_whitelister, validate_image_tag_update_with_whitelister,
        validate_image_tag_with_whitelister, validate_image_update,
    },
};
use itertools::Itertools as _;
use serde::Serialize;

use crate::{config::Config, input::Input, tips};

/// How long resolving all of an import's hosts may take.
const HOST_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a single registry ping may take.
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// The outcome of validating one input.
#[derive(Debug, Serialize)]
pub(crate) struct Report {
    pub(crate) path: Utf8PathBuf,
    pub(crate) kind: &'static str,
    pub(crate) name: String,
    pub(crate) errors: ErrorList,
}

impl Report {
    fn new(input: &Input, errors: ErrorList) -> Self {
        Self {
            path: input.path.clone(),
            kind: input.kind(),
            name: input.name().into(),
            errors,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub(crate) struct Checker<'a> {
    config: &'a Config,
    resolver: Arc<dyn Resolver>,
    /// Skips resolving import hosts.
    offline: bool,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(config: &'a Config, resolver: Arc<dyn Resolver>, offline: bool) -> Self {
        Self {
            config,
            resolver,
            offline,
        }
    }

    /// Validates `input` as a newly created object.
    pub(crate) async fn check(&self, input: &Input) -> Result<Report> {
        let whitelister = self.config.whitelister.as_ref();

        let errors = match &input.object {
            Object::Image(image) => validate_image(image),
            Object::ImageStream(stream) => {
                validate_image_stream_with_whitelister(whitelister, stream)
            }
            Object::ImageStreamTag(ist) => {
                validate_image_stream_tag_with_whitelister(whitelister, ist)
            }
            Object::ImageTag(itag) => validate_image_tag_with_whitelister(whitelister, itag),
            Object::ImageStreamImport(isi) => {
                let mut errors = validate_image_stream_import(isi);
                errors.extend(validate_image_stream_import_allowed_registries(whitelister, isi));
                errors.extend(self.check_import_hosts(input, isi).await?);
                errors
            }
        };

        Ok(Report::new(input, errors))
    }

    /// Validates `new` as an update of `old`.
    ///
    /// With `status`, only the status of an image stream is considered
    /// updated.
    pub(crate) fn check_update(&self, new: &Input, old: &Input, status: bool) -> Result<Report> {
        let whitelister = self.config.whitelister.as_ref();

        if status && !matches!(new.object, Object::ImageStream(_)) {
            bail!(tips(
                format!("can't validate a status update of {new}"),
                &["--status only applies to ImageStream objects"]
            ));
        }

        let errors = match (&new.object, &old.object) {
            (Object::Image(new), Object::Image(old)) => validate_image_update(new, old),
            (Object::ImageStream(new), Object::ImageStream(old)) if status => {
                validate_image_stream_status_update_with_whitelister(whitelister, new, old)
            }
            (Object::ImageStream(new), Object::ImageStream(old)) => {
                validate_image_stream_update_with_whitelister(whitelister, new, old)
            }
            (Object::ImageStreamTag(new), Object::ImageStreamTag(old)) => {
                validate_image_stream_tag_update_with_whitelister(whitelister, new, old)
            }
            (Object::ImageTag(new), Object::ImageTag(old)) => {
                validate_image_tag_update_with_whitelister(whitelister, new, old)
            }
            (Object::ImageStreamImport(_), Object::ImageStreamImport(_)) => bail!(tips(
                format!("can't validate {new} as an update"),
                &["imports are only ever created; validate it without --previous"]
            )),
            _ => bail!(tips(
                format!("can't validate {new} as an update of {old}"),
                &["--previous must hold an object of the same kind"]
            )),
        };

        Ok(Report::new(new, errors))
    }

    async fn check_import_hosts(
        &self,
        input: &Input,
        isi: &ImageStreamImport,
    ) -> Result<ErrorList> {
        if self.offline {
            tracing::debug!("offline: not checking import hosts of {input}");
            return Ok(ErrorList::new());
        }

        tokio::time::timeout(
            HOST_CHECK_TIMEOUT,
            validate_image_stream_import_disallowed_hosts(
                isi,
                &self.config.host_policy,
                self.resolver.as_ref(),
            ),
        )
        .await
        .map_err(|_| anyhow!("timed out checking the import hosts of {input}"))
    }

    /// Contacts every registry the valid imports would pull from.
    ///
    /// Outcomes are only logged; an unreachable registry isn't a
    /// validation failure.
    pub(crate) async fn ping(&self, inputs: &[Input], reports: &[Report]) -> Result<()> {
        let targets = inputs
            .iter()
            .zip(reports)
            .filter(|(_, report)| report.is_valid())
            .filter_map(|(input, _)| match &input.object {
                Object::ImageStreamImport(isi) => Some(isi),
                _ => None,
            })
            .flat_map(import_registries)
            .unique()
            .collect::<Vec<_>>();

        if targets.is_empty() {
            tracing::info!("no import registries to ping");
            return Ok(());
        }

        let client = restricted_client(self.config.host_policy.clone(), self.resolver.clone())?;

        for (registry, insecure) in targets {
            match tokio::time::timeout(PING_TIMEOUT, ping_registry(&client, &registry, insecure))
                .await
            {
                Ok(Ok(status)) => tracing::info!("{registry} is reachable ({status})"),
                Ok(Err(err)) => tracing::warn!("{registry} is unreachable: {err}"),
                Err(_) => tracing::warn!("{registry} timed out"),
            }
        }

        Ok(())
    }
}

/// The `host:port` of every registry `isi` pulls from, with whether the
/// pull is insecure.
fn import_registries(isi: &ImageStreamImport) -> Vec<(String, bool)> {
    let images = isi
        .spec
        .images
        .iter()
        .map(|image| (&image.from, image.import_policy.insecure));
    let repository = isi
        .spec
        .repository
        .iter()
        .map(|repository| (&repository.from, repository.import_policy.insecure));

    images
        .chain(repository)
        .filter(|(from, _)| from.is_docker_image())
        .filter_map(|(from, insecure)| {
            let reference = DockerImageReference::parse(&from.name).ok()?;
            let (host, port) = reference.registry_host_port(insecure);
            Some((join_host_port(&host, &port), insecure))
        })
        .collect()
}
