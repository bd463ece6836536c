//! HTML fragments derived from catalog data.

use calefon_core::{Brand, ErrorCode, Model, ResistanceKind, Specs, ThermostatKind};

use crate::repairs::{REPAIR_TYPES, RepairType};

/// Escape text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct PartCard<'a> {
    url: String,
    title: &'a str,
    detail: String,
    icon: &'a str,
    color: &'a str,
    wide: bool,
}

impl PartCard<'_> {
    fn render(&self) -> String {
        let span = if self.wide { " md:col-span-2" } else { "" };
        format!(
            r#"
    <a href="{url}" target="_blank" class="group bg-white border-2 border-gray-200 rounded-lg p-4 hover:border-{color}-500 hover:shadow-md transition-all flex items-center{span}">
        <div class="bg-{color}-100 text-{color}-600 rounded-full w-12 h-12 flex items-center justify-center mr-4">
            <i class="fas {icon}"></i>
        </div>
        <div class="flex-1">
            <h4 class="font-bold text-gray-800">{title}</h4>
            <p class="text-xs text-gray-500">{detail}</p>
        </div>
        <i class="fas fa-external-link-alt text-gray-400"></i>
    </a>"#,
            url = self.url,
            color = self.color,
            icon = self.icon,
            title = self.title,
            detail = escape_html(&self.detail),
        )
    }
}

/// Spare-parts block with store links chosen by the classified spec kinds.
#[must_use]
pub fn spare_parts(specs: &Specs, store_url: &str) -> String {
    let store = store_url.trim_end_matches('/');
    let resistance = specs.resistance.clone().unwrap_or_default();
    let thermostat = specs.thermostat.clone().unwrap_or_default();

    let (resistance_path, resistance_title) = match specs.resistance_kind {
        ResistanceKind::Rosca => ("resistencias-rosca", "Resistencia de Rosca"),
        ResistanceKind::Brida => ("resistencias-brida", "Resistencia de Brida"),
        ResistanceKind::Standard => ("resistencias-rosca", "Resistencia"),
    };
    let (thermostat_path, thermostat_title) = match specs.thermostat_kind {
        ThermostatKind::Varilla => ("termostatos-varilla", "Termostato de Varilla"),
        ThermostatKind::Contacto => ("termostatos-contacto", "Termostato de Contacto"),
        ThermostatKind::Digital => ("termostatos-digitales", "Termostato Digital"),
        ThermostatKind::Standard => ("termostatos-contacto", "Termostato"),
    };

    let mut cards = vec![
        PartCard {
            url: format!("{store}/{resistance_path}"),
            title: resistance_title,
            detail: resistance.clone(),
            icon: "fa-bolt",
            color: "blue",
            wide: false,
        },
        PartCard {
            url: format!("{store}/{thermostat_path}"),
            title: thermostat_title,
            detail: thermostat,
            icon: "fa-thermometer-half",
            color: "orange",
            wide: false,
        },
        PartCard {
            url: format!("{store}/anodos-magnesio"),
            title: "Ánodo de Magnesio",
            detail: specs.anode.clone().unwrap_or_else(|| "Estándar".to_string()),
            icon: "fa-shield-alt",
            color: "green",
            wide: false,
        },
        PartCard {
            url: format!("{store}/valvulas-seguridad"),
            title: "Válvula de Seguridad",
            detail: "3/4\" - 6 bar".to_string(),
            icon: "fa-faucet",
            color: "purple",
            wide: false,
        },
    ];

    if specs.resistance_kind == ResistanceKind::Brida {
        cards.push(PartCard {
            url: format!("{store}/juntas-brida"),
            title: "Junta de Brida",
            detail: format!("Compatible con {resistance}"),
            icon: "fa-circle-notch",
            color: "red",
            wide: true,
        });
    }

    let mut html = String::from(
        r#"<div class="bg-gradient-to-br from-blue-50 to-indigo-50 rounded-xl p-6 sm:p-8 mb-12 border-2 border-blue-200">
    <div class="flex items-center mb-6">
        <h2 class="text-2xl font-bold text-gray-800">Repuestos Recomendados</h2>
    </div>
    <div class="grid grid-cols-1 md:grid-cols-2 gap-4">"#,
    );
    for card in &cards {
        html.push_str(&card.render());
    }
    html.push_str("\n    </div>\n</div>");
    html
}

/// Table rows for a model's error codes.
#[must_use]
pub fn error_rows(codes: &[ErrorCode]) -> String {
    codes
        .iter()
        .map(|err| {
            format!(
                r#"
                    <tr class="hover:bg-gray-50 transition-colors">
                        <td class="p-4 font-mono font-bold text-gray-800">{}</td>
                        <td class="p-4 text-gray-700">{}</td>
                        <td class="p-4 text-gray-600">{}</td>
                    </tr>"#,
                escape_html(&err.code),
                escape_html(&err.description),
                escape_html(&err.solution),
            )
        })
        .collect()
}

/// Symptom cards. The leak card mentions the flange gasket only for flange heaters.
#[must_use]
pub fn diagnosis_cards(brand: &str, resistance: ResistanceKind) -> String {
    let brand = escape_html(brand);
    let gasket = if resistance == ResistanceKind::Brida {
        "\n            <li><strong>Junta de brida:</strong> La goma de la brida se deteriora con el tiempo</li>"
    } else {
        ""
    };

    format!(
        r#"
<div class="bg-blue-50 rounded-xl border-2 border-blue-200 p-8">
    <h3 class="text-2xl font-bold text-gray-800"><i class="fas fa-power-off mr-2"></i>No Enciende</h3>
    <p class="text-gray-600 my-4">El calefón {brand} no se activa al encenderlo. Sin luz piloto ni señales de funcionamiento.</p>
    <ul class="space-y-3 text-sm text-gray-700">
        <li><strong>Disyuntor:</strong> Verificar que el disyuntor térmico no haya saltado</li>
        <li><strong>Termostato de seguridad:</strong> Puede haberse activado por sobrecalentamiento</li>
        <li><strong>Alimentación:</strong> Medir voltaje en los bornes de entrada</li>
    </ul>
</div>
<div class="bg-orange-50 rounded-xl border-2 border-orange-200 p-8">
    <h3 class="text-2xl font-bold text-gray-800"><i class="fas fa-thermometer-empty mr-2"></i>No Calienta</h3>
    <p class="text-gray-600 my-4">El equipo enciende, pero el agua sale tibia o fría.</p>
    <ul class="space-y-3 text-sm text-gray-700">
        <li><strong>Resistencia:</strong> Medir continuidad con multímetro (30-40 Ω)</li>
        <li><strong>Termostato:</strong> Verificar ajuste de temperatura y continuidad</li>
        <li><strong>Sarro acumulado:</strong> Reduce la eficiencia de la resistencia</li>
    </ul>
</div>
<div class="bg-red-50 rounded-xl border-2 border-red-200 p-8">
    <h3 class="text-2xl font-bold text-gray-800"><i class="fas fa-tint mr-2"></i>Pierde Agua</h3>
    <p class="text-gray-600 my-4">Goteo continuo o fuga visible desde el calefón, válvula o conexiones.</p>
    <ul class="space-y-3 text-sm text-gray-700">{gasket}
        <li><strong>Válvula de seguridad:</strong> Goteo normal cuando hay sobrepresión</li>
        <li><strong>Conexiones:</strong> Revisar apriete de niples de entrada y salida</li>
        <li><strong>Tanque perforado:</strong> Corrosión avanzada, requiere reemplazo</li>
    </ul>
</div>
"#
    )
}

fn repair_card(href: &str, repair: &RepairType) -> String {
    format!(
        r#"
<a href="{href}" class="group bg-white rounded-xl shadow-sm border-2 border-gray-200 p-6 hover:border-{color}-500 flex items-start">
    <div class="bg-{color}-100 text-{color}-600 rounded-full w-12 h-12 flex items-center justify-center mr-5 flex-shrink-0">
        <i class="fas {icon} text-xl"></i>
    </div>
    <div>
        <h3 class="text-lg font-bold text-gray-800">{title}</h3>
        <p class="text-sm text-gray-500">Dificultad: {difficulty} · {duration}</p>
    </div>
</a>"#,
        color = repair.color,
        icon = repair.icon,
        title = repair.title,
        difficulty = repair.difficulty,
        duration = repair.duration,
    )
}

/// Cards linking to every repair guide of the brand.
///
/// `dir_prefix` is the path from the current page to the brand directory,
/// `"./"` for the brand index and `"../"` for model pages.
#[must_use]
pub fn repair_guide_cards(dir_prefix: &str) -> String {
    REPAIR_TYPES
        .iter()
        .map(|repair| {
            let href = format!("{dir_prefix}reparaciones/{}.html", repair.id);
            repair_card(&href, repair)
        })
        .collect()
}

/// Model cards for a brand index page. Models without a usable id get no
/// page, so they are not listed.
#[must_use]
pub fn model_list(models: &[Model]) -> String {
    models
        .iter()
        .filter(|m| m.has_safe_id())
        .map(|m| {
            format!(
                r#"
<div class="bg-white border-2 border-gray-200 rounded-xl p-6 hover:border-blue-500 hover:shadow-lg transition-all">
    <h3 class="text-xl font-bold text-gray-800 mb-4">{name}</h3>
    <p class="text-gray-600 text-sm mb-4">{description}</p>
    <a href="./modelos/{id}.html" class="text-xs text-gray-500 hover:text-blue-600">Ver especificaciones</a>
</div>"#,
                name = escape_html(&m.name),
                description = escape_html(&m.description),
                id = escape_html(&m.id),
            )
        })
        .collect()
}

/// Brand links for the root index.
#[must_use]
pub fn brand_list(brands: &[Brand]) -> String {
    brands
        .iter()
        .map(|b| {
            format!(
                "\n            <li><a href=\"./{slug}/index.html\" class=\"block p-4 bg-white rounded-lg shadow-sm hover:shadow-md\">{name}</a></li>",
                slug = b.slug(),
                name = escape_html(&b.name),
            )
        })
        .collect()
}

/// Links from one repair guide to the brand's other guides.
#[must_use]
pub fn other_repairs(current_id: &str) -> String {
    REPAIR_TYPES
        .iter()
        .filter(|r| r.id != current_id)
        .map(|r| {
            format!(
                "\n                <li><a href=\"./{id}.html\" class=\"block p-4 border border-gray-200 rounded-lg hover:shadow-md\"><i class=\"fas {icon} text-{color}-600 mr-2\"></i>{title}</a></li>",
                id = r.id,
                icon = r.icon,
                color = r.color,
                title = r.title,
            )
        })
        .collect()
}
