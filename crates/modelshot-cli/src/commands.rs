//! Subcommand handlers.

use std::{fs, io, io::Write, str::FromStr};

use log::info;
use serde::Serialize;

use modelshot::{
    ModelshotError,
    pipeline::{ScreenshotOptions, Stage},
    service::{CreateRequest, ListRequest, MaintenanceMode, RawPayload, UpdateRequest},
};
use modelshot_core::{
    identifier::{ModelId, Slug, UserId},
    visibility::Visibility,
};

use crate::{Command, Runtime};

pub(crate) fn check_model(path: &str, out: &mut dyn Write) -> Result<(), ModelshotError> {
    let graph = RawPayload::Text(fs::read_to_string(path)?).parse_graph()?;

    writeln!(
        out,
        "{path}: {} content types, {} relations",
        graph.len(),
        graph.relations().count()
    )?;
    for content_type in graph.content_types() {
        writeln!(
            out,
            "  {} ({}): {} fields",
            content_type.id(),
            content_type.name,
            content_type.fields.len()
        )?;
    }
    Ok(())
}

pub(crate) fn check_layout(path: &str, out: &mut dyn Write) -> Result<(), ModelshotError> {
    let layout = RawPayload::Text(fs::read_to_string(path)?)
        .parse_layout()?
        .normalize();
    write_json(out, &layout)
}

pub(crate) fn execute(
    runtime: &Runtime,
    command: &Command,
    out: &mut dyn Write,
) -> Result<(), ModelshotError> {
    let service = &runtime.service;

    match command {
        Command::CheckModel { path } => check_model(path, out),
        Command::CheckLayout { path } => check_layout(path, out),
        Command::Create {
            token,
            title,
            description,
            model,
            layout,
            visibility,
        } => {
            let viewer = service.viewer(Some(token), None);
            let request = CreateRequest {
                title: title.clone(),
                description: description.clone(),
                model: read_payload(model)?,
                layout: read_payload(layout)?,
                visibility: visibility.as_deref().map(parse_visibility).transpose()?,
            };
            write_json(out, &service.create(&viewer, request)?)
        }
        Command::Update {
            token,
            id,
            title,
            description,
            visibility,
            model,
            layout,
        } => {
            let viewer = service.viewer(Some(token), None);
            let request = UpdateRequest {
                title: title.clone(),
                description: description.clone(),
                visibility: visibility.as_deref().map(parse_visibility).transpose()?,
                model: model.as_deref().map(read_payload).transpose()?,
                layout: layout.as_deref().map(read_payload).transpose()?,
                ..UpdateRequest::new(parse_model_id(id)?)
            };
            write_json(out, &service.update(&viewer, request)?)
        }
        Command::Delete { token, id } => {
            let viewer = service.viewer(Some(token), None);
            write_json(out, &service.delete(&viewer, parse_model_id(id)?)?)
        }
        Command::Show {
            slug,
            token,
            preview_secret,
        } => {
            let viewer = service.viewer(token.as_deref(), preview_secret.as_deref());
            write_json(out, &service.get_by_slug(&viewer, &Slug::new(slug.as_str()))?)
        }
        Command::List {
            token,
            page,
            count,
            search,
            user,
            visibility,
        } => {
            let viewer = service.viewer(token.as_deref(), None);
            let request = ListRequest {
                page: *page,
                count: *count,
                search: search.clone(),
                owner: user.as_deref().map(UserId::new),
                visibility: visibility.as_deref().map(parse_visibility).transpose()?,
            };
            write_json(out, &service.list(&viewer, request)?)
        }
        Command::Screenshot {
            slug,
            skip_meta,
            skip_diagrams,
        } => screenshot(runtime, slug, *skip_meta, *skip_diagrams, out),
        Command::Backfill { limit } => {
            let limit = limit.unwrap_or_else(|| runtime.config.maintenance().backfill_limit());
            let queued = service.backfill(MaintenanceMode::Backfill { limit })?;
            writeln!(out, "Queued {queued} regeneration(s)")?;
            Ok(())
        }
    }
}

/// Result of a foreground screenshot run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotSummary {
    slug: String,
    completed: Vec<&'static str>,
    meta_image: Option<String>,
    image: Option<String>,
    image_no_connections: Option<String>,
}

fn screenshot(
    runtime: &Runtime,
    slug: &str,
    skip_meta: bool,
    skip_diagrams: bool,
    out: &mut dyn Write,
) -> Result<(), ModelshotError> {
    let target = runtime.service.regeneration_target(&Slug::new(slug))?;
    let mut options = ScreenshotOptions::refresh();
    if skip_meta {
        options = options.without_meta_image();
    }
    if skip_diagrams {
        options = options.without_diagram_images();
    }

    let mut report = runtime.pipeline.run(target.model.id, &options);
    if let Some(failure) = report.failure.take() {
        return Err(failure.error);
    }
    if report.is_skipped() {
        return Err(ModelshotError::NotFound("content model"));
    }

    let (image, image_no_connections) = match report.images {
        Some((image, no_connections)) => (Some(image.public_id), Some(no_connections.public_id)),
        None => (None, None),
    };
    info!(slug; "Screenshots stored");
    write_json(
        out,
        &ScreenshotSummary {
            slug: slug.to_string(),
            completed: report.completed.iter().copied().map(Stage::as_str).collect(),
            meta_image: report.meta_image.map(|asset| asset.public_id),
            image,
            image_no_connections,
        },
    )
}

fn read_payload(path: &str) -> Result<RawPayload, ModelshotError> {
    Ok(RawPayload::Text(fs::read_to_string(path)?))
}

fn parse_visibility(input: &str) -> Result<Visibility, ModelshotError> {
    modelshot_parser::parse_visibility(input)
        .map_err(|err| ModelshotError::new_parse_error(err, input))
}

fn parse_model_id(input: &str) -> Result<ModelId, ModelshotError> {
    ModelId::from_str(input.trim())
        .map_err(|_| ModelshotError::Invalid(format!("`{input}` is not a content model id")))
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<(), ModelshotError> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}
