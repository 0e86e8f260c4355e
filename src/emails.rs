//! HTML rendering for outbound notifications and the response page.
//!
//! Pure string building; nothing here touches storage or the network.

use crate::db::models::{DonationRecord, Ngo, Restaurant};

/// Escapes user-supplied text interpolated into HTML.
fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn respond_link(base_url: &str, decision: &str, request_id: i64) -> String {
    format!("{base_url}/api/respond?decision={decision}&requestId={request_id}")
}

fn respond_buttons(base_url: &str, request_id: i64) -> String {
    format!(
        concat!(
            r#"<div style="margin-top:20px;">"#,
            r#"<a href="{accept}" style="background:#16a34a;color:white;padding:12px 20px;text-decoration:none;border-radius:5px;font-weight:bold;display:inline-block;margin-right:10px;">Accept Pickup</a>"#,
            r#"<a href="{decline}" style="background:#dc2626;color:white;padding:12px 20px;text-decoration:none;border-radius:5px;font-weight:bold;display:inline-block;">Decline</a>"#,
            r#"</div>"#
        ),
        accept = respond_link(base_url, "accept", request_id),
        decline = respond_link(base_url, "decline", request_id),
    )
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        concat!(
            r#"<tr><td style="padding:12px 15px;border-bottom:1px solid #e2e8f0;font-weight:bold;width:35%;">{label}</td>"#,
            r#"<td style="padding:12px 15px;border-bottom:1px solid #e2e8f0;">{value}</td></tr>"#
        ),
        label = label,
        value = value,
    )
}

fn shell(heading: &str, inner: &str) -> String {
    format!(
        concat!(
            r#"<html><body style="font-family:Arial,sans-serif;color:#333;max-width:600px;margin:0 auto;">"#,
            r#"<div style="background:#f8fafc;padding:20px;text-align:center;border-bottom:3px solid #16a34a;">"#,
            r#"<h1 style="color:#16a34a;margin:0;">Mealbridge</h1>"#,
            r#"<p style="margin:5px 0 0;color:#64748b;">{heading}</p>"#,
            r#"</div><div style="padding:30px;">{inner}</div></body></html>"#
        ),
        heading = heading,
        inner = inner,
    )
}

/// Alert sent to the NGO first assigned to a fresh donation. Contact
/// details come from the registered restaurant profile when one exists,
/// else from the snapshot on the record.
pub fn assignment_alert(
    ngo: &Ngo,
    record: &DonationRecord,
    profile: Option<&Restaurant>,
    base_url: &str,
) -> (String, String) {
    let (name, location, email, contact) = match profile {
        Some(p) => (&p.name, &p.location, &p.email, &p.contact),
        None => (&record.restaurant, &record.location, &record.email, &record.contact),
    };

    let mut rows = String::new();
    rows.push_str(&detail_row("Restaurant", &esc(name)));
    rows.push_str(&detail_row("Location", &esc(location)));
    rows.push_str(&detail_row("Food Type", &esc(&record.food_type)));
    rows.push_str(&detail_row("Quantity", &format!("{} meals", record.quantity)));
    rows.push_str(&detail_row("Expiry Priority", &esc(&record.expiry)));
    rows.push_str(&detail_row(
        "Contact Details",
        &format!("Phone: {}<br/>Email: {}", esc(contact), esc(email)),
    ));
    let notes = if record.notes.is_empty() { "None provided" } else { record.notes.as_str() };
    rows.push_str(&detail_row("Notes", &esc(notes)));

    let inner = format!(
        concat!(
            r#"<h2 style="margin-top:0;color:#0f172a;">New Food Pickup Assigned to {ngo}</h2>"#,
            r#"<p>Hello {ngo} Team,</p>"#,
            r#"<p>A surplus food donation near you is waiting for a responder.</p>"#,
            r#"<table style="width:100%;border-collapse:collapse;margin-top:20px;background:#f1f5f9;border-radius:8px;overflow:hidden;">{rows}</table>"#,
            r#"<p>Please confirm your decision:</p>{buttons}"#
        ),
        ngo = esc(&ngo.name),
        rows = rows,
        buttons = respond_buttons(base_url, record.id),
    );

    (
        "New Food Donation Request Assigned".to_string(),
        shell("Emergency Food Rescue Alert", &inner),
    )
}

/// Alert sent to the next NGO after a decline.
pub fn forwarded_alert(ngo: &Ngo, record: &DonationRecord, base_url: &str) -> (String, String) {
    let inner = format!(
        concat!(
            r#"<h2 style="margin-top:0;color:#0f172a;">New Donation Request</h2>"#,
            r#"<p>Hello <b>{ngo}</b>,</p>"#,
            r#"<p>A food donation request is available for pickup near you (forwarded after a previous decline).</p>"#,
            r#"<p><b>Restaurant:</b> {restaurant}</p>"#,
            r#"<p><b>Location:</b> {location}</p>"#,
            r#"<p><b>Quantity:</b> {quantity} meals</p>"#,
            r#"{buttons}"#
        ),
        ngo = esc(&ngo.name),
        restaurant = esc(&record.restaurant),
        location = esc(&record.location),
        quantity = record.quantity,
        buttons = respond_buttons(base_url, record.id),
    );

    (
        "New Food Donation Request - Please Respond".to_string(),
        shell("Forwarded Donation Request", &inner),
    )
}

/// Confirmation sent to the donor restaurant once an NGO accepts, with the
/// NGO's contact details for the pickup.
pub fn acceptance_notice(record: &DonationRecord, ngo: Option<&Ngo>) -> (String, String) {
    let (ngo_name, ngo_contact, ngo_email) = match ngo {
        Some(n) => (n.name.as_str(), n.contact.as_str(), n.email.as_str()),
        None => (record.ngo_assigned.as_str(), "Unknown", "Unknown"),
    };

    let inner = format!(
        concat!(
            r#"<h2 style="margin-top:0;color:#0f172a;">Great News! Your Donation was Accepted!</h2>"#,
            r#"<p>Hello {restaurant},</p>"#,
            r#"<p>The NGO <strong>{ngo}</strong> has accepted your surplus food donation request.</p>"#,
            r#"<div style="background:#f1f5f9;padding:15px;border-radius:8px;margin:20px 0;">"#,
            r#"<h3 style="margin-top:0;color:#16a34a;">Pickup Details</h3>"#,
            r#"<p><strong>Food:</strong> {food} ({quantity} meals)</p>"#,
            r#"<p><strong>Location:</strong> {location}</p>"#,
            r#"<hr style="border:none;border-top:1px solid #cbd5e1;margin:10px 0;"/>"#,
            r#"<h3 style="margin-top:0;color:#0f172a;">NGO Contact Info</h3>"#,
            r#"<p><strong>NGO:</strong> {ngo}</p>"#,
            r#"<p><strong>Phone:</strong> {phone}</p>"#,
            r#"<p><strong>Email:</strong> {email}</p>"#,
            r#"</div>"#,
            r#"<p>Please ensure the food is packaged and ready for their volunteers to pick up before the expiry time.</p>"#
        ),
        restaurant = esc(&record.restaurant),
        ngo = esc(ngo_name),
        food = esc(&record.food_type),
        quantity = record.quantity,
        location = esc(&record.location),
        phone = esc(ngo_contact),
        email = esc(ngo_email),
    );

    (
        format!("Update on your Food Donation Request : {}", record.id),
        shell("Donation Status Update", &inner),
    )
}

/// Notice sent to the donor restaurant when every NGO at the location has
/// declined.
pub fn exhaustion_notice(record: &DonationRecord) -> (String, String) {
    let inner = format!(
        concat!(
            r#"<h2 style="margin-top:0;color:#0f172a;">No NGO Could Take Your Donation</h2>"#,
            r#"<p>Hello {restaurant},</p>"#,
            r#"<p>Every NGO we could reach in <b>{location}</b> declined this request. "#,
            r#"Nothing further will happen automatically; you may submit the donation again later.</p>"#,
            r#"<p><strong>Food:</strong> {food} ({quantity} meals)</p>"#
        ),
        restaurant = esc(&record.restaurant),
        location = esc(&record.location),
        food = esc(&record.food_type),
        quantity = record.quantity,
    );

    (
        format!("Update on your Food Donation Request : {}", record.id),
        shell("Donation Status Update", &inner),
    )
}

/// Page shown in the browser after an NGO follows an accept/decline link.
pub fn response_page(message: &str, base_url: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><title>Response Recorded</title><style>",
            "body{{font-family:'Segoe UI',Tahoma,Geneva,Verdana,sans-serif;display:flex;justify-content:center;align-items:center;height:100vh;background-color:#f3f4f6;margin:0;}}",
            ".card{{background:white;padding:40px;border-radius:12px;box-shadow:0 4px 15px rgba(0,0,0,0.1);text-align:center;max-width:400px;}}",
            "h1{{color:#111827;font-size:24px;margin-bottom:10px;}}",
            "p{{color:#4b5563;line-height:1.5;}}",
            ".btn{{margin-top:20px;display:inline-block;padding:10px 20px;background:#16a34a;color:white;text-decoration:none;border-radius:6px;font-weight:bold;}}",
            "</style></head><body><div class=\"card\">",
            "<h1>Action Recorded</h1><p>{message}</p>",
            "<p>You can now safely close this window.</p>",
            "<a href=\"{base_url}\" class=\"btn\">View Live Dashboard</a>",
            "</div></body></html>"
        ),
        message = esc(message),
        base_url = base_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DonationStatus;

    fn sample_record() -> DonationRecord {
        DonationRecord {
            id: 7,
            restaurant: "A2B".to_string(),
            contact: "9000000000".to_string(),
            location: "Tambaram".to_string(),
            food_type: "Rice".to_string(),
            quantity: 50,
            expiry: "2h".to_string(),
            email: "a2b@example.org".to_string(),
            notes: String::new(),
            status: DonationStatus::WaitingForResponse,
            ngo_assigned: "Helping Hands".to_string(),
            contacted: vec!["Helping Hands".to_string()],
            history: vec![],
            created_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    fn sample_ngo() -> Ngo {
        Ngo {
            id: 1,
            name: "Helping Hands".to_string(),
            location: "Tambaram".to_string(),
            email: "hh@example.org".to_string(),
            contact: "9876543210".to_string(),
        }
    }

    #[test]
    fn assignment_alert_carries_both_response_links() {
        let (subject, body) =
            assignment_alert(&sample_ngo(), &sample_record(), None, "http://localhost:8080");
        assert_eq!(subject, "New Food Donation Request Assigned");
        assert!(body.contains("http://localhost:8080/api/respond?decision=accept&requestId=7"));
        assert!(body.contains("http://localhost:8080/api/respond?decision=decline&requestId=7"));
        assert!(body.contains("50 meals"));
    }

    #[test]
    fn user_text_is_escaped() {
        let mut record = sample_record();
        record.restaurant = "<script>alert(1)</script>".to_string();
        let (_, body) = forwarded_alert(&sample_ngo(), &record, "http://localhost:8080");
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[test]
    fn acceptance_notice_prefers_directory_contact_details() {
        let ngo = sample_ngo();
        let (subject, body) = acceptance_notice(&sample_record(), Some(&ngo));
        assert!(subject.ends_with("7"));
        assert!(body.contains("9876543210"));
        assert!(body.contains("hh@example.org"));

        let (_, fallback) = acceptance_notice(&sample_record(), None);
        assert!(fallback.contains("Unknown"));
    }
}
