//! Customer and staff facing message text.

use rust_decimal::Decimal;

use crate::{
    domain::{Breakdown, CartLine, CatalogItem, Order, Session, Style},
    formatting::{format_cart, format_names, format_numbered, format_numbered_bold, format_phone, format_price},
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str = "─────────────────";

fn percent(p: Decimal) -> String {
    p.normalize().to_string()
}

fn style_or_unset(style: Option<Style>) -> &'static str {
    style.map(Style::as_str).unwrap_or("No especificado")
}

fn budget_or_unset(budget: &str) -> &str {
    if budget.trim().is_empty() {
        "A confirmar"
    } else {
        budget
    }
}

pub fn greeting(store_name: &str) -> String {
    format!(
        "🏃‍♂️💨 *¡Hola! Bienvenido a {store_name}* 🏃‍♂️\n\n\
         Somos tu tienda de ropa urbana y clásica de la mejor calidad en Cartagena.\n\n\
         🤖 *Soy tu asistente virtual inteligente* y te voy a ayudar a encontrar exactamente lo que buscas.\n\n\
         *¿Cómo te llamas?* 😊"
    )
}

pub fn ask_name_again() -> &'static str {
    "No alcancé a leer tu nombre. *¿Cómo te llamas?* 😊"
}

pub fn ask_style(name: &str) -> String {
    format!(
        "¡Mucho gusto, *{name}*! 👋\n\n\
         Ahora, cuéntanos, ¿qué tipo de estilo buscas?\n\n\
         🏙️ *Urbano* - Para un look moderno y fresco\n\
         👔 *Clásico* - Elegancia atemporal"
    )
}

pub fn style_reprompt() -> &'static str {
    "Por favor selecciona una opción:\n1. Urbano\n2. Clásico"
}

pub fn ask_catalog(style: Style) -> String {
    format!(
        "¡Excelente! 🎯 Estilo *{}* seleccionado.\n\n\
         📱 *¿Cómo quieres ver nuestros productos?*\n\n\
         🔗 *Ver catálogo completo online* - Navega en nuestra página web\n\
         🛒 *Ver aquí mismo* - Te muestro algunos productos destacados",
        style.label()
    )
}

pub fn online_catalog(url: &str) -> String {
    format!(
        "📱 *Aquí está nuestro catálogo online:*\n\n🔗 {url}\n\n\
         Puedes filtrar por:\n\
         • Estilo: Urbano 🏙️ / Clásico 👔\n\
         • Tipo: Camisetas, Buzos, Pantalonetas...\n\
         • Género: Hombre / Mujer\n\n\
         Cuando encuentres algo que te guste, vuelve aquí y me dices qué quieres comprar. 💪"
    )
}

/// Plain-text listing used when no item matches the chosen style.
pub fn plain_listing(items: &[CatalogItem]) -> String {
    if items.is_empty() {
        return "📦 Por ahora no tenemos productos disponibles para mostrarte aquí.\n\n\
                *¿Qué estás buscando?* Escríbelo y te ayudo a encontrarlo."
            .to_string();
    }
    format!(
        "📦 *Nuestros productos disponibles:*\n\n{}\n\n*¿Cuál te interesa?* Escribe el número o el nombre.",
        format_numbered(items)
    )
}

pub fn featured_list(count: usize) -> String {
    format!(
        "📦 *Nuestros productos ({count}):*\n\nSelecciona uno para ver detalles o escribe lo que buscas."
    )
}

pub fn product_detail(item: &CatalogItem) -> String {
    let mut out = format!(
        "🛍️ *{}*\n\n💰 *Precio:* ${}",
        item.name,
        format_price(item.price)
    );
    if !item.sizes.is_empty() {
        out.push_str(&format!("\n📏 Tallas: {}", item.sizes.join(", ")));
    }
    if !item.colors.is_empty() {
        out.push_str(&format!("\n🎨 Colores: {}", item.colors.join(", ")));
    }
    let description = item
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("Producto de alta calidad.");
    out.push_str(&format!(
        "\n\n{description}\n\n*¿Cuántas unidades quieres?* (escribe un número, por ejemplo \"1\")"
    ));
    out
}

pub fn browse_results(query: &str, items: &[CatalogItem]) -> String {
    format!(
        "🔍 *Resultados para \"{query}\":*\n\n{}\n\n*¿Cuál te interesa?* Escribe el número o nombre.",
        format_numbered_bold(items)
    )
}

pub fn browse_miss(query: &str, sample: &[CatalogItem]) -> String {
    format!(
        "No encontré \"{query}\". 🤔\n\n📦 *Nuestro catálogo:*\n{}\n\n*¿Cuál te interesa?*",
        format_numbered(sample)
    )
}

pub fn product_hits(query: &str, items: &[CatalogItem]) -> String {
    format!(
        "🔍 *Encontré esto para \"{query}\":*\n\n{}\n\n\
         *¿Cuál te interesa y cuántas unidades?*\nEjemplo: \"Quiero la {}, 2 unidades\"",
        format_numbered_bold(items),
        items.first().map(|i| i.name.to_lowercase()).unwrap_or_default()
    )
}

pub fn product_miss(query: &str, popular: &[CatalogItem]) -> String {
    format!(
        "🤔 No encontré \"{query}\".\n\n💡 *Nuestros productos más populares:*\n{}\n\n*¿Cuál te interesa?*",
        format_numbered(popular)
    )
}

pub fn quantity_reprompt(sample: &[CatalogItem]) -> String {
    format!(
        "🤔 No entendí qué producto quieres.\n\n💡 *Nuestros productos:*\n{}\n\n*¿Cuál quieres?*",
        format_names(sample)
    )
}

pub fn added_to_cart(quantity: u32, name: &str, cart: &[CartLine], breakdown: &Breakdown) -> String {
    format!(
        "✅ *¡Agregado al carrito!*\n\n🛒 *{quantity}x {name}*\n\n\
         📦 *Tu carrito actual:*\n{}\n\n\
         💵 *Subtotal:* ${}\n\
         Comisión ({}%): ${}\n\n\
         *¿Algo más?* Responde:\n\
         • \"Sí\" o \"agregar más\" - para seguir comprando\n\
         • \"No\" o \"continuar\" - para ver resumen y finalizar",
        format_cart(cart),
        format_price(breakdown.subtotal),
        percent(breakdown.percentage),
        format_price(breakdown.commission),
    )
}

pub fn add_more() -> &'static str {
    "Perfecto, ¿qué más te interesa?\n\nPuedes:\n• Escribir el nombre de un producto\n• Decir \"ver catálogo\" para ver más opciones"
}

pub fn order_summary(session: &Session, breakdown: &Breakdown) -> String {
    format!(
        "📋 *RESUMEN DE TU PEDIDO*\n\n\
         *Cliente:* {}\n\
         *Estilo:* {}\n\
         *Presupuesto:* {}\n\n\
         🛒 *Productos:*\n{}\n\n\
         💰 *RESUMEN FINANCIERO:*\n{THIN_RULE}\n\
         Subtotal: ${}\n\
         Comisión ({}%): -${}\n{THIN_RULE}\n\
         💵 *Para la tienda:* ${}\n\n{THIN_RULE}\n\n\
         *¿Confirmas este pedido?* ✅\n\n\
         Responde \"Sí\" o \"confirmar\" para enviar a procesar.",
        session.customer_name,
        style_or_unset(session.style),
        budget_or_unset(&session.budget),
        format_cart(&session.cart),
        format_price(breakdown.subtotal),
        percent(breakdown.percentage),
        format_price(breakdown.commission),
        format_price(breakdown.net),
    )
}

pub fn intermediary_summary(order: &Order) -> String {
    let products = order
        .items
        .iter()
        .map(|l| format!("• {}x {} - ${}", l.quantity, l.name, format_price(l.total())))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "🛒 *NUEVO PEDIDO #{number}*\n\n{RULE}\n\
         👤 *CLIENTE:*\n\
         • Nombre: {name}\n\
         • Teléfono: {phone}\n\
         • Estilo: {style}\n\
         • Presupuesto: {budget}\n{RULE}\n\n\
         📦 *PRODUCTOS:*\n{products}\n\n{RULE}\n\
         💰 *RESUMEN FINANCIERO:*\n\
         • Subtotal: ${subtotal}\n\
         • Comisión ({pct}%): ${commission}\n{RULE}\n\
         💵 *TU GANANCIA:* ${commission}\n\
         🏪 *PARA LA TIENDA:* ${net}\n{RULE}\n\n\
         📞 *Acción:* Contactar al cliente para confirmar detalles de entrega y pago.",
        number = order.order_number,
        name = order.customer_name,
        phone = format_phone(&order.customer_phone),
        style = style_or_unset(order.style),
        budget = budget_or_unset(&order.budget),
        subtotal = format_price(order.subtotal),
        pct = percent(order.commission_percentage),
        commission = format_price(order.commission_amount),
        net = format_price(order.net_amount),
    )
}

pub fn owner_notice(order: &Order) -> String {
    let products = order
        .items
        .iter()
        .map(|l| format!("• {}x {}", l.quantity, l.name))
        .collect::<Vec<_>>()
        .join("\n");
    let phone = format_phone(&order.customer_phone);
    format!(
        "🏪 *NUEVO PEDIDO #{}*\n\n\
         👤 Cliente: {}\n\
         📱 Teléfono: {phone}\n\n\
         📦 *Productos:*\n{products}\n\n\
         💰 *Monto total:* ${}\n\
         📝 Pedido confirmado por intermediario\n\n\
         💡 El cliente está esperando tu contacto para finalizar la venta.\n\n\
         📞 Contactar: {phone}",
        order.order_number,
        order.customer_name,
        format_price(order.subtotal),
    )
}

pub fn customer_confirmation(order: &Order, store_name: &str) -> String {
    format!(
        "✅ *¡Pedido confirmado, {}!* 🎉\n\n\
         📋 *Número de pedido:* #{}\n\n\
         🛒 *Resumen:*\n{}\n\n\
         💰 *Total:* ${}\n\n\
         📞 *Próximos pasos:*\n\
         Nuestro equipo te contactará al {} para confirmar:\n\n\
         • Método de pago\n\
         • Dirección de entrega\n\
         • Disponibilidad de productos\n\n\
         🏃‍♂️💨 ¡Gracias por elegir {store_name}!",
        order.customer_name,
        order.order_number,
        format_cart(&order.items),
        format_price(order.subtotal),
        format_phone(&order.customer_phone),
    )
}

pub fn inactivity_nudge(name: &str) -> String {
    let greeting = if name.trim().is_empty() {
        "⏰ *Hola,*".to_string()
    } else {
        format!("⏰ *Hola {name},*")
    };
    format!(
        "{greeting}\n\n\
         Hemos notado que has estado inactivo. ¿Sigues interesado en nuestros productos?\n\n\
         Responde \"sí\" para continuar o \"no\" para que te contactemos después."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::OrderStatus, testing::item};
    use chrono::Utc;

    fn order() -> Order {
        let now = Utc::now();
        let items = vec![CartLine {
            product_id: "1".into(),
            name: "Camiseta Negra".into(),
            price: Decimal::from(50_000),
            quantity: 2,
            size: None,
            color: None,
            note: None,
        }];
        let b = Breakdown::compute(Decimal::from(100_000), Decimal::from(10));
        Order {
            order_number: "WA-20261017-0001".into(),
            customer_phone: "573001112233".into(),
            customer_name: "Andrea".into(),
            items,
            subtotal: b.subtotal,
            commission_percentage: b.percentage,
            commission_amount: b.commission,
            net_amount: b.net,
            style: Some(Style::Urban),
            budget: String::new(),
            status: OrderStatus::Pending,
            notified_intermediary: false,
            notified_owner: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn intermediary_summary_highlights_earning_and_store_amount() {
        let text = intermediary_summary(&order());
        assert!(text.contains("#WA-20261017-0001"));
        assert!(text.contains("• 2x Camiseta Negra - $100.000"));
        assert!(text.contains("Comisión (10%): $10.000"));
        assert!(text.contains("*TU GANANCIA:* $10.000"));
        assert!(text.contains("*PARA LA TIENDA:* $90.000"));
        assert!(text.contains("+57 (300) 111-2233"));
        assert!(text.contains("Presupuesto: A confirmar"));
    }

    #[test]
    fn owner_notice_omits_commission() {
        let text = owner_notice(&order());
        assert!(text.contains("• 2x Camiseta Negra"));
        assert!(text.contains("*Monto total:* $100.000"));
        assert!(!text.contains("Comisión"));
    }

    #[test]
    fn detail_lists_sizes_and_colors_when_present() {
        let mut it = item("7", "Buzo Gris", 80_000);
        it.sizes = vec!["S".into(), "M".into()];
        let text = product_detail(&it);
        assert!(text.contains("📏 Tallas: S, M"));
        assert!(!text.contains("Colores"));
        assert!(text.contains("Producto de alta calidad."));
    }

    #[test]
    fn nudge_without_name_reads_naturally() {
        assert!(inactivity_nudge("").starts_with("⏰ *Hola,*"));
        assert!(inactivity_nudge("Andrea").starts_with("⏰ *Hola Andrea,*"));
    }
}
