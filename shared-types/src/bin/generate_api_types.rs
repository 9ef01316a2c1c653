use shared_types::*;
use std::fs;
use std::path::PathBuf;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for the bridge and template apps
    let mut types = Vec::new();

    // Event types
    types.push(clean_type(Event::export_to_string()?));
    types.push(clean_type(EventDetails::export_to_string()?));
    types.push(clean_type(RsvpConfig::export_to_string()?));
    types.push(clean_type(RsvpType::export_to_string()?));
    types.push(clean_type(TemplateContract::export_to_string()?));
    types.push(clean_type(EventsResponse::export_to_string()?));

    // RSVP field types
    types.push(clean_type(RsvpFieldDef::export_to_string()?));
    types.push(clean_type(RsvpFieldType::export_to_string()?));
    types.push(clean_type(RsvpFieldsResponse::export_to_string()?));

    // Guest types
    types.push(clean_type(Guest::export_to_string()?));
    types.push(clean_type(GuestStatus::export_to_string()?));
    types.push(clean_type(GuestProgress::export_to_string()?));
    types.push(clean_type(ButtonFlags::export_to_string()?));

    // Access types
    types.push(clean_type(GuestEventAccess::export_to_string()?));
    types.push(clean_type(SubEventAccess::export_to_string()?));
    types.push(clean_type(SetAccessRequest::export_to_string()?));
    types.push(clean_type(GuestAccessResponse::export_to_string()?));

    // Wish types
    types.push(clean_type(Wish::export_to_string()?));
    types.push(clean_type(WishReply::export_to_string()?));
    types.push(clean_type(NewWish::export_to_string()?));
    types.push(clean_type(NewWishReply::export_to_string()?));

    // Message contract
    types.push(clean_type(InboundKind::export_to_string()?));
    types.push(clean_type(InvitationLoaded::export_to_string()?));
    types.push(clean_type(StatusUpdate::export_to_string()?));
    types.push(clean_type(PayloadUpdate::export_to_string()?));

    // Bridge API types
    types.push(clean_type(InvitationLinkResponse::export_to_string()?));
    types.push(clean_type(OpenFrameRequest::export_to_string()?));
    types.push(clean_type(OpenFrameResponse::export_to_string()?));
    types.push(clean_type(InboundEnvelope::export_to_string()?));
    types.push(clean_type(BusOutcomeResponse::export_to_string()?));
    types.push(clean_type(QueuedMessage::export_to_string()?));
    types.push(clean_type(OutboxResponse::export_to_string()?));
    types.push(clean_type(ReloadResponse::export_to_string()?));

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("../bridge/src/api-types"));
    fs::create_dir_all(&output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // Every type lands in the same file, so cross-type imports are dropped
    let filtered: Vec<&str> = type_def
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("import type")
                && !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
