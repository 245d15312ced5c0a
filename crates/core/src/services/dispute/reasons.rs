//! Built-in reason catalogue, served when the database has none.

use super::view::ReasonView;

const FALLBACK: &[(&str, &str, &str)] = &[
    ("no_recibido", "Pedido no recibido", "order"),
    ("no_coincide", "El producto no coincide con la descripción", "order"),
    ("danado", "Producto dañado", "order"),
    ("producto_incorrecto", "Producto incorrecto", "order"),
    ("reembolso_pendiente", "Reembolso no procesado", "order"),
    ("contenido_no_entregado", "Contenido no entregado", "campaign"),
    ("brief_incumplido", "No se siguió el brief", "campaign"),
    ("pago_no_recibido", "Pago no recibido", "campaign"),
    ("postulacion_rechazada", "Postulación rechazada injustamente", "application"),
    ("condiciones_cambiadas", "Condiciones cambiadas tras la aceptación", "application"),
    ("pago_no_recibido", "Pago no recibido", "application"),
    ("otro", "Otro", "order"),
    ("otro", "Otro", "campaign"),
    ("otro", "Otro", "application"),
];

/// Fallback reasons, optionally restricted to one category, in display order.
#[must_use]
pub fn fallback_reasons(categoria: Option<&str>) -> Vec<ReasonView> {
    FALLBACK
        .iter()
        .filter(|(_, _, c)| categoria.is_none_or(|wanted| wanted == *c))
        .map(|(clave, titulo, c)| ReasonView {
            clave: (*clave).to_string(),
            titulo: (*titulo).to_string(),
            categoria: (*c).to_string(),
        })
        .collect()
}
