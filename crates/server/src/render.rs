//! Server-rendered pages for the RSVP form.

use std::fmt::Write as _;

use server_api::{ConfirmOutcome, SearchOutcome};
use shared::{
    domain::{attendance_field_name, AttendanceStatus},
    protocol::{
        ATTENDANCE_YES, ATTENDEES_FIELD, FAMILY_FIELD, MESSAGE_FIELD, SEARCH_FIELD,
        SUBMITTER_FIELD,
    },
};

const DECLINE_VALUE: &str = "No";

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n<main>\n{body}</main>\n</body>\n</html>\n",
        escape(title)
    )
}

/// Search screen, optionally showing a validation message above the form.
pub fn search_page(message: Option<&str>) -> String {
    let mut body = String::from("<h1>Confirme su asistencia</h1>\n");
    if let Some(message) = message {
        let _ = writeln!(body, "<p class=\"message\" role=\"alert\">{}</p>", escape(message));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/rsvp\">\n\
         <label for=\"{SEARCH_FIELD}\">Su nombre como aparece en la invitación</label>\n\
         <input id=\"{SEARCH_FIELD}\" name=\"{SEARCH_FIELD}\" type=\"text\" required autofocus>\n\
         <button type=\"submit\">Buscar</button>\n\
         </form>\n"
    );
    page("RSVP", &body)
}

/// Per-member attendance form for the family found by a search.
pub fn family_page(outcome: &SearchOutcome) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>¡Hola, {}!</h1>", escape(&outcome.matched_name));
    if outcome.is_edit() {
        body.push_str("<p>Su familia ya respondió. Puede revisar y cambiar las respuestas aquí abajo.</p>\n");
    }

    let _ = writeln!(
        body,
        "<form method=\"post\" action=\"/rsvp\">\n\
         <input type=\"hidden\" name=\"{FAMILY_FIELD}\" value=\"{}\">",
        escape(outcome.family_id.as_str())
    );
    body.push_str("<fieldset>\n<legend>¿Quién asistirá?</legend>\n");
    for member in &outcome.members {
        let field = escape(&attendance_field_name(&member.name));
        let prior = outcome.prior.get(&member.name).map(|p| p.status);
        let checked = |status: AttendanceStatus| {
            if prior == Some(status) {
                " checked"
            } else {
                ""
            }
        };
        let _ = writeln!(
            body,
            "<div class=\"guest\">\n<span>{name}</span>\n\
             <label><input type=\"radio\" name=\"{field}\" value=\"{ATTENDANCE_YES}\"{yes}> Sí</label>\n\
             <label><input type=\"radio\" name=\"{field}\" value=\"{DECLINE_VALUE}\"{no}> No</label>\n\
             </div>",
            name = escape(&member.name),
            yes = checked(AttendanceStatus::Yes),
            no = checked(AttendanceStatus::No),
        );
    }
    body.push_str("</fieldset>\n");

    if let [only] = outcome.members.as_slice() {
        if only.seats_allowed > 1 {
            let current = outcome
                .prior
                .get(&only.name)
                .and_then(|p| p.attendees)
                .unwrap_or(1);
            let _ = writeln!(
                body,
                "<label for=\"{ATTENDEES_FIELD}\">Número de asistentes (máximo {max})</label>\n\
                 <input id=\"{ATTENDEES_FIELD}\" name=\"{ATTENDEES_FIELD}\" type=\"number\" \
                 min=\"1\" max=\"{max}\" value=\"{current}\">",
                max = only.seats_allowed,
            );
        }
    }

    let prior_message = outcome
        .prior
        .values()
        .map(|p| p.message.as_str())
        .find(|m| !m.is_empty())
        .unwrap_or("");
    let _ = write!(
        body,
        "<label for=\"{SUBMITTER_FIELD}\">¿Quién responde?</label>\n\
         <input id=\"{SUBMITTER_FIELD}\" name=\"{SUBMITTER_FIELD}\" type=\"text\" value=\"{submitter}\">\n\
         <label for=\"{MESSAGE_FIELD}\">Mensaje para los novios</label>\n\
         <textarea id=\"{MESSAGE_FIELD}\" name=\"{MESSAGE_FIELD}\" rows=\"4\">{message}</textarea>\n\
         <button type=\"submit\">Enviar</button>\n\
         </form>\n",
        submitter = escape(&outcome.matched_name),
        message = escape(prior_message),
    );
    page("RSVP", &body)
}

pub fn success_page(outcome: &ConfirmOutcome) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>¡Gracias, {}!</h1>", escape(&outcome.recorded_by));
    let headline = match outcome.attending() {
        0 => "Lamentamos que no pueda acompañarnos. Su respuesta quedó registrada.".to_string(),
        1 => "Registramos 1 asistente.".to_string(),
        n => format!("Registramos {n} asistentes."),
    };
    let _ = writeln!(body, "<p>{}</p>\n<ul>", escape(&headline));
    for (name, status) in &outcome.answers {
        let answer = match status {
            AttendanceStatus::Yes => "asistirá",
            _ => "no asistirá",
        };
        let _ = writeln!(body, "<li>{}: {answer}</li>", escape(name));
    }
    body.push_str("</ul>\n<p><a href=\"/\">Volver</a></p>\n");
    page("Confirmación registrada", &body)
}

/// Page for failures the guest cannot fix; details stay in the server log.
pub fn error_page() -> String {
    page(
        "Algo salió mal",
        "<h1>Algo salió mal</h1>\n\
         <p>No pudimos registrar su respuesta. Intente más tarde o contacte a los novios.</p>\n\
         <p><a href=\"/\">Volver</a></p>\n",
    )
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
